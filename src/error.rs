// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error types for the relationship and filter engines

use crate::types::{ContentAction, ContentType, Pair, ServiceKey, TagSlice};
use thiserror::Error;

/// Errors raised by the tag engines.
///
/// Everything except `Io`/`Json` is local and recoverable: the caller can
/// correct the input and retry, and no state was mutated.
#[derive(Debug, Error)]
pub enum TagError {
    /// Adding the pair would close a cycle.
    #[error("adding {pair} would create a loop: {}", chain.join(" -> "))]
    LoopDetected {
        /// The rejected pair
        pair: Pair,
        /// The chain walked before the loop closed
        chain: Vec<String>,
    },

    /// The pair connects to a sibling loop that already exists.
    #[error(
        "{pair} connects to a sibling loop already in the database, undo it first: {}",
        tags.join(", ")
    )]
    PreexistingLoop {
        /// The rejected pair
        pair: Pair,
        /// Tags seen in the loop
        tags: Vec<String>,
    },

    /// The old tag already maps to a different new tag.
    #[error("there already is a relationship set for '{old}' (-> '{existing_new}'), cannot map it to '{requested_new}'")]
    AmbiguousSibling {
        /// Old tag
        old: String,
        /// Where it currently goes
        existing_new: String,
        /// Where the caller wanted it to go
        requested_new: String,
    },

    /// A tag was paired with itself.
    #[error("'{tag}' cannot be related to itself")]
    SelfReferential {
        /// The tag
        tag: String,
    },

    /// The requested rule has no effect given existing rules.
    #[error("{}: {reason}", slice.describe())]
    RedundantRule {
        /// Slice the caller tried to add
        slice: TagSlice,
        /// Why it does nothing
        reason: String,
    },

    /// The account lacks the grant for this operation.
    #[error("service {service} does not permit {action} on {content_type}")]
    PermissionDenied {
        /// Service
        service: ServiceKey,
        /// Content type
        content_type: ContentType,
        /// Attempted action
        action: ContentAction,
    },

    /// The content type has no relationship graph to validate against.
    #[error("{content_type} cannot be edited as relationship pairs")]
    UnsupportedContentType {
        /// Content type of the session
        content_type: ContentType,
    },

    /// A collapse/expand walk exceeded its cap, which means the graph holds a cycle.
    #[error("resolution of '{tag}' exceeded {limit} steps; relationship graph contains a cycle")]
    InvariantViolation {
        /// Tag being resolved
        tag: String,
        /// The cap
        limit: usize,
    },

    /// A pair import held an odd number of tags.
    #[error("uneven number of tags found ({count})")]
    UnevenPairImport {
        /// Tags found
        count: usize,
    },

    /// A persisted object has a version this build cannot upgrade.
    #[error("{name} version {version} is not supported")]
    UnknownSerialisableVersion {
        /// Object name
        name: String,
        /// Stored version
        version: u32,
    },

    /// A persisted object does not have the expected shape.
    #[error("malformed {name}: {reason}")]
    MalformedSerialisable {
        /// Object name
        name: String,
        /// What was wrong
        reason: String,
    },

    /// No service is registered under this key or name.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// No editing session is open for the service.
    #[error("no open {content_type} session for service {service}")]
    NoSession {
        /// Service
        service: ServiceKey,
        /// Content type of the session
        content_type: ContentType,
    },

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias for the engines
pub type Result<T> = std::result::Result<T, TagError>;
