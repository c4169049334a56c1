// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Relationship status stores and editing sessions
//!
//! A [`StatusStore`] records, for one service and one content type, which
//! pairs are current, pending or petitioned. An [`EditSession`] holds the
//! authoritative snapshot it was opened from next to the copy the user is
//! editing, plus the reason attached to each pend/petition.

use crate::types::{ContentAction, ContentType, ContentUpdate, Pair, RelationshipStatus, ServiceKey, Tag};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Bucketed on-disk / wire shape: `{status: [pairs]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusBuckets {
    /// Accepted pairs
    #[serde(default)]
    pub current: BTreeSet<Pair>,
    /// Pairs proposed for addition
    #[serde(default)]
    pub pending: BTreeSet<Pair>,
    /// Pairs proposed for removal
    #[serde(default)]
    pub petitioned: BTreeSet<Pair>,
}

/// Pair -> status for one service; a pair sits in at most one bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatusBuckets", into = "StatusBuckets")]
pub struct StatusStore {
    statuses: BTreeMap<Pair, RelationshipStatus>,
}

impl From<StatusBuckets> for StatusStore {
    fn from(buckets: StatusBuckets) -> Self {
        let mut store = Self::new();
        // petitioned pairs are also listed as current by some sources; the
        // later insert wins, so petitioned overrides current
        for pair in buckets.current {
            store.set(pair, RelationshipStatus::Current);
        }
        for pair in buckets.pending {
            store.set(pair, RelationshipStatus::Pending);
        }
        for pair in buckets.petitioned {
            store.set(pair, RelationshipStatus::Petitioned);
        }
        store
    }
}

impl From<StatusStore> for StatusBuckets {
    fn from(store: StatusStore) -> Self {
        let mut buckets = Self::default();
        for (pair, status) in store.statuses {
            match status {
                RelationshipStatus::Current => buckets.current.insert(pair),
                RelationshipStatus::Pending => buckets.pending.insert(pair),
                RelationshipStatus::Petitioned => buckets.petitioned.insert(pair),
            };
        }
        buckets
    }
}

impl StatusStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of a pair, `None` when absent (deleted)
    #[must_use]
    pub fn status(&self, pair: &Pair) -> Option<RelationshipStatus> {
        self.statuses.get(pair).copied()
    }

    /// Put a pair in a bucket, moving it out of any other
    pub fn set(&mut self, pair: Pair, status: RelationshipStatus) {
        self.statuses.insert(pair, status);
    }

    /// Drop a pair entirely
    pub fn remove(&mut self, pair: &Pair) -> Option<RelationshipStatus> {
        self.statuses.remove(pair)
    }

    /// Pairs in one bucket
    #[must_use]
    pub fn pairs(&self, status: RelationshipStatus) -> BTreeSet<Pair> {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(pair, _)| pair.clone())
            .collect()
    }

    /// Every pair with its status
    pub fn iter(&self) -> impl Iterator<Item = (&Pair, RelationshipStatus)> {
        self.statuses.iter().map(|(pair, status)| (pair, *status))
    }

    /// CURRENT ∪ PENDING − PETITIONED
    pub fn effective_pairs(&self) -> impl Iterator<Item = &Pair> {
        self.statuses
            .iter()
            .filter(|(_, status)| matches!(status, RelationshipStatus::Current | RelationshipStatus::Pending))
            .map(|(pair, _)| pair)
    }

    /// Number of pairs in a bucket
    #[must_use]
    pub fn count(&self, status: RelationshipStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    /// Total pairs across buckets
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// No pairs at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Every tag mentioned by any pair
    #[must_use]
    pub fn tags(&self) -> HashSet<Tag> {
        self.statuses
            .keys()
            .flat_map(|pair| [pair.0.clone(), pair.1.clone()])
            .collect()
    }

    /// Realise content updates against this store (the local write path)
    pub fn apply(&mut self, updates: &[ContentUpdate]) {
        for update in updates {
            let Some(pair) = update.as_pair() else {
                continue;
            };

            match update.action {
                ContentAction::Add => self.set(pair.clone(), RelationshipStatus::Current),
                ContentAction::Delete => {
                    self.remove(pair);
                }
                ContentAction::Pend => {
                    if self.status(pair) != Some(RelationshipStatus::Current) {
                        self.set(pair.clone(), RelationshipStatus::Pending);
                    }
                }
                ContentAction::RescindPend => {
                    if self.status(pair) == Some(RelationshipStatus::Pending) {
                        self.remove(pair);
                    }
                }
                ContentAction::Petition => self.set(pair.clone(), RelationshipStatus::Petitioned),
                ContentAction::RescindPetition => {
                    if self.status(pair) == Some(RelationshipStatus::Petitioned) {
                        self.set(pair.clone(), RelationshipStatus::Current);
                    }
                }
            }
        }
    }
}

/// A pair as shown in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPair {
    /// The pair
    pub pair: Pair,
    /// Its status in the edited snapshot
    pub status: RelationshipStatus,
    /// Conflict note, for sibling pairs whose old tag is being reassigned
    pub note: Option<String>,
}

mod reasons_serde {
    use crate::types::Pair;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(reasons: &HashMap<Pair, String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<(&Pair, &String)> = reasons.iter().collect();
        entries.sort();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HashMap<Pair, String>, D::Error> {
        let entries: Vec<(Pair, String)> = Vec::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// One editing session: original snapshot, edited copy, reasons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSession {
    /// Service being edited
    pub service: ServiceKey,
    /// Siblings or parents
    pub content_type: ContentType,
    /// When the snapshot was read
    pub opened_at: DateTime<Utc>,
    original: StatusStore,
    current: StatusStore,
    #[serde(with = "reasons_serde", default)]
    reasons: HashMap<Pair, String>,
}

impl EditSession {
    /// Open a session from an authoritative read
    #[must_use]
    pub fn open(service: ServiceKey, content_type: ContentType, original: StatusStore) -> Self {
        debug!("Opened {} session on {} with {} pairs", content_type, service, original.len());
        Self {
            service,
            content_type,
            opened_at: Utc::now(),
            current: original.clone(),
            original,
            reasons: HashMap::new(),
        }
    }

    /// The snapshot as read
    #[must_use]
    pub fn original(&self) -> &StatusStore {
        &self.original
    }

    /// The snapshot being edited
    #[must_use]
    pub fn current(&self) -> &StatusStore {
        &self.current
    }

    /// Mutable access to the edited snapshot
    pub fn current_mut(&mut self) -> &mut StatusStore {
        &mut self.current
    }

    /// Record why a pair is being pended/petitioned
    pub fn set_reason(&mut self, pair: Pair, reason: String) {
        self.reasons.insert(pair, reason);
    }

    /// Reason stored for a pair
    #[must_use]
    pub fn reason(&self, pair: &Pair) -> Option<&str> {
        self.reasons.get(pair).map(String::as_str)
    }

    /// Has anything changed since the session opened?
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.original != self.current
    }

    /// Pairs to show.
    ///
    /// With no pertinent tags: every pending/petitioned pair, plus current
    /// ones only when `show_all`. Otherwise: pairs touching a pertinent tag,
    /// or everything when `show_all`.
    #[must_use]
    pub fn list_pairs(&self, pertinent: &HashSet<Tag>, show_all: bool, reassigning: &HashSet<Tag>) -> Vec<ListedPair> {
        let mut listed: Vec<ListedPair> = self
            .current
            .iter()
            .filter(|(pair, status)| {
                if pertinent.is_empty() {
                    *status != RelationshipStatus::Current || show_all
                } else {
                    show_all || pertinent.contains(pair.left()) || pertinent.contains(pair.right())
                }
            })
            .map(|(pair, status)| ListedPair {
                note: self.conflict_note(pair, status, reassigning),
                pair: pair.clone(),
                status,
            })
            .collect();

        listed.sort_by(|a, b| (a.status, &a.pair).cmp(&(b.status, &b.pair)));
        listed
    }

    fn conflict_note(&self, pair: &Pair, status: RelationshipStatus, reassigning: &HashSet<Tag>) -> Option<String> {
        if self.content_type != ContentType::TagSiblings || !reassigning.contains(pair.left()) {
            return None;
        }
        match status {
            RelationshipStatus::Pending => Some("CONFLICT: Will be rescinded on add.".into()),
            RelationshipStatus::Current => Some("CONFLICT: Will be petitioned/deleted on add.".into()),
            RelationshipStatus::Petitioned => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> Pair {
        Pair::new(a, b)
    }

    fn tags(items: &[&str]) -> HashSet<Tag> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_effective_pairs_exclude_petitioned() {
        let mut store = StatusStore::new();
        store.set(pair("a", "b"), RelationshipStatus::Current);
        store.set(pair("c", "d"), RelationshipStatus::Pending);
        store.set(pair("e", "f"), RelationshipStatus::Petitioned);

        let effective: Vec<&Pair> = store.effective_pairs().collect();
        assert_eq!(effective, vec![&pair("a", "b"), &pair("c", "d")]);
    }

    #[test]
    fn test_single_bucket_per_pair() {
        let mut store = StatusStore::new();
        store.set(pair("a", "b"), RelationshipStatus::Current);
        store.set(pair("a", "b"), RelationshipStatus::Petitioned);

        assert_eq!(store.len(), 1);
        assert_eq!(store.count(RelationshipStatus::Current), 0);
        assert_eq!(store.status(&pair("a", "b")), Some(RelationshipStatus::Petitioned));
    }

    #[test]
    fn test_buckets_json_shape() {
        let json = r#"{"current":[["a","b"],["x","y"]],"pending":[["c","d"]],"petitioned":[["x","y"]]}"#;
        let store: StatusStore = serde_json::from_str(json).unwrap();

        assert_eq!(store.status(&pair("a", "b")), Some(RelationshipStatus::Current));
        assert_eq!(store.status(&pair("x", "y")), Some(RelationshipStatus::Petitioned));

        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["pending"][0][1], "d");
        assert_eq!(value["current"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_apply_local_and_remote_updates() {
        let mut store = StatusStore::new();
        store.set(pair("old", "gone"), RelationshipStatus::Current);
        store.set(pair("p", "q"), RelationshipStatus::Petitioned);

        store.apply(&[
            ContentUpdate::pair(ContentType::TagSiblings, ContentAction::Add, pair("a", "b"), None),
            ContentUpdate::pair(ContentType::TagSiblings, ContentAction::Delete, pair("old", "gone"), None),
            ContentUpdate::pair(ContentType::TagSiblings, ContentAction::Pend, pair("c", "d"), Some("why".into())),
            ContentUpdate::pair(ContentType::TagSiblings, ContentAction::RescindPetition, pair("p", "q"), None),
        ]);

        assert_eq!(store.status(&pair("a", "b")), Some(RelationshipStatus::Current));
        assert_eq!(store.status(&pair("old", "gone")), None);
        assert_eq!(store.status(&pair("c", "d")), Some(RelationshipStatus::Pending));
        assert_eq!(store.status(&pair("p", "q")), Some(RelationshipStatus::Current));

        store.apply(&[ContentUpdate::pair(ContentType::TagSiblings, ContentAction::RescindPend, pair("c", "d"), None)]);
        assert_eq!(store.status(&pair("c", "d")), None);
    }

    #[test]
    fn test_session_starts_unmodified() {
        let mut original = StatusStore::new();
        original.set(pair("a", "b"), RelationshipStatus::Current);

        let mut session = EditSession::open(ServiceKey::from_name("my tags"), ContentType::TagParents, original);
        assert!(!session.is_modified());

        session.current_mut().set(pair("c", "d"), RelationshipStatus::Pending);
        assert!(session.is_modified());
        assert_eq!(session.original().len(), 1);
    }

    #[test]
    fn test_list_pairs_rules() {
        let mut original = StatusStore::new();
        original.set(pair("a", "b"), RelationshipStatus::Current);
        original.set(pair("c", "d"), RelationshipStatus::Pending);
        original.set(pair("e", "f"), RelationshipStatus::Petitioned);
        let session = EditSession::open(ServiceKey::from_name("ptr"), ContentType::TagSiblings, original);
        let none = HashSet::new();

        let listed = session.list_pairs(&none, false, &none);
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|l| l.status != RelationshipStatus::Current));

        assert_eq!(session.list_pairs(&none, true, &none).len(), 3);

        let listed = session.list_pairs(&tags(&["b"]), false, &none);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pair, pair("a", "b"));

        let listed = session.list_pairs(&tags(&["a"]), false, &tags(&["a"]));
        assert_eq!(listed[0].note.as_deref(), Some("CONFLICT: Will be petitioned/deleted on add."));
    }

    #[test]
    fn test_session_round_trips_reasons() {
        let mut session = EditSession::open(ServiceKey::from_name("ptr"), ContentType::TagParents, StatusStore::new());
        session.current_mut().set(pair("cat", "animal"), RelationshipStatus::Pending);
        session.set_reason(pair("cat", "animal"), "obvious by definition".into());

        let json = serde_json::to_string(&session).unwrap();
        let restored: EditSession = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.reason(&pair("cat", "animal")), Some("obvious by definition"));
        assert!(restored.is_modified());
    }
}
