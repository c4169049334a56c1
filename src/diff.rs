// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Diff an edited relationship snapshot into content updates
//!
//! Repository updates are a set difference against the original snapshot,
//! never a replay of what the user clicked: a pair pended and then rescinded
//! inside one session produces nothing at all.

use crate::status::{EditSession, StatusStore};
use crate::types::{ContentAction, ContentType, ContentUpdate, Pair, RelationshipStatus, ServiceKind};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Compute the updates that take `original` to `current`.
///
/// Local services have no review step, so everything pending becomes an ADD
/// and everything petitioned a DELETE. Repositories get pend / rescind-pend /
/// petition / rescind-petition from the four set differences, with the
/// stored reason on pends and petitions.
#[must_use]
pub fn compute_content_updates(
    kind: ServiceKind,
    content_type: ContentType,
    original: &StatusStore,
    current: &StatusStore,
    reasons: &HashMap<Pair, String>,
) -> Vec<ContentUpdate> {
    let mut updates = Vec::new();

    let update = |action: ContentAction, pair: Pair, with_reason: bool| {
        let reason = if with_reason { reasons.get(&pair).cloned() } else { None };
        ContentUpdate::pair(content_type, action, pair, reason)
    };

    match kind {
        ServiceKind::Local => {
            updates.extend(
                current
                    .pairs(RelationshipStatus::Pending)
                    .into_iter()
                    .map(|pair| update(ContentAction::Add, pair, false)),
            );
            updates.extend(
                current
                    .pairs(RelationshipStatus::Petitioned)
                    .into_iter()
                    .map(|pair| update(ContentAction::Delete, pair, false)),
            );
        }
        ServiceKind::Repository => {
            let current_pending = current.pairs(RelationshipStatus::Pending);
            let original_pending = original.pairs(RelationshipStatus::Pending);
            let current_petitioned = current.pairs(RelationshipStatus::Petitioned);
            let original_petitioned = original.pairs(RelationshipStatus::Petitioned);

            let difference = |a: &BTreeSet<Pair>, b: &BTreeSet<Pair>| -> Vec<Pair> { a.difference(b).cloned().collect() };

            for pair in difference(&current_pending, &original_pending) {
                updates.push(update(ContentAction::Pend, pair, true));
            }
            for pair in difference(&original_pending, &current_pending) {
                updates.push(update(ContentAction::RescindPend, pair, false));
            }
            for pair in difference(&current_petitioned, &original_petitioned) {
                updates.push(update(ContentAction::Petition, pair, true));
            }
            for pair in difference(&original_petitioned, &current_petitioned) {
                updates.push(update(ContentAction::RescindPetition, pair, false));
            }
        }
    }

    info!("Computed {} {} update(s)", updates.len(), content_type);
    updates
}

impl EditSession {
    /// Run the diff for this session
    #[must_use]
    pub fn content_updates(&self, kind: ServiceKind) -> Vec<ContentUpdate> {
        let reasons: HashMap<Pair, String> = self
            .current()
            .iter()
            .filter_map(|(pair, _)| self.reason(pair).map(|r| (pair.clone(), r.to_string())))
            .collect();
        compute_content_updates(kind, self.content_type, self.original(), self.current(), &reasons)
    }
}
