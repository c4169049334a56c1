// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Tagsync library - tag sibling/parent relationships kept in sync with
//! petition-reviewed tag repositories
//!
//! This crate provides tag filters and per-service display filtering,
//! sibling collapse and parent expansion, write-time conflict resolution,
//! and the diff that turns an edited relationship snapshot into content
//! updates.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod diff;
pub mod display;
pub mod error;
pub mod filter;
pub mod graph;
pub mod interchange;
pub mod manager;
pub mod repository;
pub mod resolver;
pub mod serialise;
pub mod status;

pub use error::{Result, TagError};

/// Core data types shared by every engine
pub mod types {
    use serde::{Deserialize, Serialize};
    use sha2::{Digest, Sha256};
    use std::collections::{BTreeMap, BTreeSet};
    use std::fmt;

    // =========================================================================
    // Tags
    // =========================================================================

    /// A tag is a plain string, optionally `namespace:subtag`
    pub type Tag = String;

    /// Split a tag into `(namespace, subtag)`.
    ///
    /// Unnamespaced tags (including ones that merely start with `:`) have an
    /// empty namespace.
    #[must_use]
    pub fn split_tag(tag: &str) -> (&str, &str) {
        match tag.split_once(':') {
            Some((namespace, subtag)) if !namespace.is_empty() => (namespace, subtag),
            _ => ("", tag),
        }
    }

    /// Join a namespace and subtag back into a tag
    #[must_use]
    pub fn combine_tag(namespace: &str, subtag: &str) -> Tag {
        if namespace.is_empty() {
            subtag.to_string()
        } else {
            format!("{namespace}:{subtag}")
        }
    }

    // =========================================================================
    // Tag Slices and Rules
    // =========================================================================

    /// A pattern over tags used by filter rules
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(into = "String", from = "String")]
    pub enum TagSlice {
        /// Exactly this tag
        Tag(Tag),
        /// Every tag in a namespace (`"series:"`)
        Namespace(String),
        /// Every namespaced tag (`":"`)
        AllNamespaced,
        /// Every unnamespaced tag (`""`)
        AllUnnamespaced,
    }

    impl TagSlice {
        /// Parse the string form used in storage and text interchange
        #[must_use]
        pub fn parse(s: &str) -> Self {
            if s.is_empty() {
                Self::AllUnnamespaced
            } else if s == ":" {
                Self::AllNamespaced
            } else if s.matches(':').count() == 1 && s.ends_with(':') {
                Self::Namespace(s[..s.len() - 1].to_string())
            } else {
                Self::Tag(s.to_string())
            }
        }

        /// Every slice that covers `tag`, exact tag first then broader ones
        #[must_use]
        pub fn slices_for(tag: &str) -> Vec<Self> {
            let (namespace, _) = split_tag(tag);
            let mut slices = vec![Self::Tag(tag.to_string())];
            if namespace.is_empty() {
                slices.push(Self::AllUnnamespaced);
            } else {
                slices.push(Self::Namespace(namespace.to_string()));
                slices.push(Self::AllNamespaced);
            }
            slices
        }

        /// True for the two global slices, `""` and `":"`
        #[must_use]
        pub fn is_global(&self) -> bool {
            matches!(self, Self::AllNamespaced | Self::AllUnnamespaced)
        }

        /// Human-readable description, e.g. `'series' tags`
        #[must_use]
        pub fn describe(&self) -> String {
            match self {
                Self::AllUnnamespaced => "unnamespaced tags".to_string(),
                Self::AllNamespaced => "namespaced tags".to_string(),
                Self::Namespace(ns) => format!("'{ns}' tags"),
                Self::Tag(tag) => tag.clone(),
            }
        }
    }

    impl fmt::Display for TagSlice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Tag(tag) => f.write_str(tag),
                Self::Namespace(ns) => write!(f, "{ns}:"),
                Self::AllNamespaced => f.write_str(":"),
                Self::AllUnnamespaced => Ok(()),
            }
        }
    }

    impl From<String> for TagSlice {
        fn from(s: String) -> Self {
            Self::parse(&s)
        }
    }

    impl From<TagSlice> for String {
        fn from(slice: TagSlice) -> Self {
            slice.to_string()
        }
    }

    /// Filter rule attached to a slice
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Rule {
        /// Explicitly permitted
        Whitelist,
        /// Explicitly hidden
        Blacklist,
    }

    // =========================================================================
    // Relationship Pairs
    // =========================================================================

    /// An ordered `(a, b)` tag pair.
    ///
    /// Siblings read old -> new, parents read child -> parent.
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct Pair(pub Tag, pub Tag);

    impl Pair {
        /// Build a pair from anything string-like
        pub fn new(a: impl Into<Tag>, b: impl Into<Tag>) -> Self {
            Self(a.into(), b.into())
        }

        /// Left element (old / child)
        #[must_use]
        pub fn left(&self) -> &str {
            &self.0
        }

        /// Right element (new / parent)
        #[must_use]
        pub fn right(&self) -> &str {
            &self.1
        }
    }

    impl fmt::Display for Pair {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}->{}", self.0, self.1)
        }
    }

    /// Lifecycle status of a pair on one service; deleted pairs are absent
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum RelationshipStatus {
        /// Accepted by the service
        Current,
        /// Proposed for addition, awaiting review
        Pending,
        /// Proposed for removal, awaiting review
        Petitioned,
    }

    impl RelationshipStatus {
        /// All buckets in display priority order
        pub const ALL: [RelationshipStatus; 3] = [Self::Pending, Self::Petitioned, Self::Current];

        /// Short list prefix
        #[must_use]
        pub fn prefix(self) -> &'static str {
            match self {
                Self::Current => "",
                Self::Pending => "(+) ",
                Self::Petitioned => "(-) ",
            }
        }
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Opaque service identifier, hex encoded
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ServiceKey(String);

    impl ServiceKey {
        const COMBINED: &'static str = "all known tags";

        /// The pseudo-service whose filters apply across every real service
        #[must_use]
        pub fn combined() -> Self {
            Self(hex::encode(Self::COMBINED))
        }

        /// Deterministic key derived from a service name
        #[must_use]
        pub fn from_name(name: &str) -> Self {
            let mut hasher = Sha256::new();
            hasher.update(name.as_bytes());
            let hash = hex::encode(hasher.finalize());
            Self(hash[..16].to_string())
        }

        /// Wrap an existing hex key
        pub fn from_hex(hex_key: impl Into<String>) -> Self {
            Self(hex_key.into())
        }

        /// Hex form
        #[must_use]
        pub fn as_hex(&self) -> &str {
            &self.0
        }

        /// Is this the combined pseudo-service?
        #[must_use]
        pub fn is_combined(&self) -> bool {
            *self == Self::combined()
        }
    }

    impl fmt::Display for ServiceKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Whether a service applies edits directly or through review
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ServiceKind {
        /// Local tag database, edits are realised immediately
        Local,
        /// Remote tag repository, edits are pended/petitioned
        Repository,
    }

    /// Action a grant allows on a content type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum PermissionAction {
        /// May pend and petition
        Petition,
        /// May act without review; reasons become "admin"
        Overrule,
    }

    /// A tag service with its account grants
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Service {
        /// Service key
        pub key: ServiceKey,
        /// Display name
        pub name: String,
        /// Local or repository
        pub kind: ServiceKind,
        /// Per-content-type grants (ignored for local services)
        #[serde(default)]
        pub permissions: BTreeMap<ContentType, BTreeSet<PermissionAction>>,
    }

    impl Service {
        /// A local tag service
        #[must_use]
        pub fn local(name: &str) -> Self {
            Self {
                key: ServiceKey::from_name(name),
                name: name.to_string(),
                kind: ServiceKind::Local,
                permissions: BTreeMap::new(),
            }
        }

        /// A tag repository with the given grants
        #[must_use]
        pub fn repository(
            name: &str,
            permissions: BTreeMap<ContentType, BTreeSet<PermissionAction>>,
        ) -> Self {
            Self {
                key: ServiceKey::from_name(name),
                name: name.to_string(),
                kind: ServiceKind::Repository,
                permissions,
            }
        }

        /// Is this a local service?
        #[must_use]
        pub fn is_local(&self) -> bool {
            self.kind == ServiceKind::Local
        }

        /// Local services may do anything
        #[must_use]
        pub fn has_permission(&self, content_type: ContentType, action: PermissionAction) -> bool {
            self.is_local()
                || self
                    .permissions
                    .get(&content_type)
                    .is_some_and(|actions| actions.contains(&action))
        }
    }

    // =========================================================================
    // Content Updates
    // =========================================================================

    /// What a content update touches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ContentType {
        /// File -> tag mappings
        Mappings,
        /// Child -> parent pairs
        TagParents,
        /// Old -> new pairs
        TagSiblings,
    }

    impl fmt::Display for ContentType {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                Self::Mappings => "mappings",
                Self::TagParents => "tag parents",
                Self::TagSiblings => "tag siblings",
            })
        }
    }

    /// What a content update does
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ContentAction {
        /// Add immediately
        Add,
        /// Delete immediately
        Delete,
        /// Propose an addition
        Pend,
        /// Propose a removal
        Petition,
        /// Withdraw a proposal to add
        RescindPend,
        /// Withdraw a proposal to remove
        RescindPetition,
    }

    impl fmt::Display for ContentAction {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(match self {
                Self::Add => "add",
                Self::Delete => "delete",
                Self::Pend => "pend",
                Self::Petition => "petition",
                Self::RescindPend => "rescind pend",
                Self::RescindPetition => "rescind petition",
            })
        }
    }

    /// Payload of a content update
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ContentData {
        /// A sibling or parent pair
        Pair(Pair),
        /// A tag applied to a set of file hashes
        Mapping {
            /// The tag
            tag: Tag,
            /// Hex file hashes
            hashes: BTreeSet<String>,
        },
    }

    /// One record for the local write path or the repository client
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ContentUpdate {
        /// Content type
        pub content_type: ContentType,
        /// Action
        pub action: ContentAction,
        /// Payload
        pub data: ContentData,
        /// Reason shown to repository janitors
        pub reason: Option<String>,
    }

    impl ContentUpdate {
        /// Update carrying a relationship pair
        #[must_use]
        pub fn pair(
            content_type: ContentType,
            action: ContentAction,
            pair: Pair,
            reason: Option<String>,
        ) -> Self {
            Self {
                content_type,
                action,
                data: ContentData::Pair(pair),
                reason,
            }
        }

        /// The pair, if this is a relationship update
        #[must_use]
        pub fn as_pair(&self) -> Option<&Pair> {
            match &self.data {
                ContentData::Pair(pair) => Some(pair),
                ContentData::Mapping { .. } => None,
            }
        }
    }

    // =========================================================================
    // Display Contexts
    // =========================================================================

    /// Independent filter namespaces for tag display
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum DisplayContext {
        /// Tags as stored
        Storage,
        /// Tags after sibling and parent resolution
        SiblingsAndParents,
        /// Tags shown on a single media viewer
        SingleMedia,
        /// Tags shown in the selection list
        SelectionList,
    }

    impl DisplayContext {
        /// Every context
        pub const ALL: [DisplayContext; 4] = [
            Self::Storage,
            Self::SiblingsAndParents,
            Self::SingleMedia,
            Self::SelectionList,
        ];

        /// Legacy numeric code
        #[must_use]
        pub fn code(self) -> u8 {
            match self {
                Self::Storage => 0,
                Self::SiblingsAndParents => 1,
                Self::SingleMedia => 2,
                Self::SelectionList => 3,
            }
        }

        /// Inverse of [`DisplayContext::code`]
        #[must_use]
        pub fn from_code(code: u64) -> Option<Self> {
            Self::ALL.into_iter().find(|c| u64::from(c.code()) == code)
        }

        /// Stable name, as stored and typed on the command line
        #[must_use]
        pub fn name(self) -> &'static str {
            match self {
                Self::Storage => "storage",
                Self::SiblingsAndParents => "siblings_and_parents",
                Self::SingleMedia => "single_media",
                Self::SelectionList => "selection_list",
            }
        }

        /// Inverse of [`DisplayContext::name`]
        #[must_use]
        pub fn from_name(name: &str) -> Option<Self> {
            Self::ALL.into_iter().find(|c| c.name() == name)
        }
    }

    impl fmt::Display for DisplayContext {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Result, TagError};
    pub use crate::types::*;
}
