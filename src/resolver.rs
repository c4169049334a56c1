// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Write-time validation and the pend/petition toggle
//!
//! Every pair the user enters goes through [`ConflictResolver`], which keeps
//! the edited snapshot free of sibling ambiguity and of cycles, and decides
//! whether entering a pair pends it, petitions it or rescinds an earlier
//! pend/petition.

use crate::error::{Result, TagError};
use crate::graph::TagGraph;
use crate::status::EditSession;
use crate::types::{ContentAction, ContentType, Pair, PermissionAction, RelationshipStatus, Service, Tag};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Prefix of the reason attached to automatic conflict petitions
pub const DEFAULT_AUTO_PETITION_REASON: &str = "AUTO-PETITION TO REASSIGN TO: ";

/// Reason used when the account can overrule review
pub const DEFAULT_OVERRULE_REASON: &str = "admin";

/// The questions a user interface would ask while pairs are entered.
///
/// Returning `None`/`false` cancels that group of changes.
pub trait Decider {
    /// Reason for pending brand-new pairs
    fn pend_reason(&mut self, pairs: &[Pair]) -> Option<String>;

    /// These pairs already exist: petition them?
    fn confirm_petition(&mut self, pairs: &[Pair]) -> bool;

    /// Reason for petitioning existing pairs
    fn petition_reason(&mut self, pairs: &[Pair]) -> Option<String>;

    /// These pairs are pending: rescind?
    fn confirm_rescind_pend(&mut self, pairs: &[Pair]) -> bool;

    /// These pairs are petitioned: rescind?
    fn confirm_rescind_petition(&mut self, pairs: &[Pair]) -> bool;
}

/// Non-interactive decider: one fixed reason, blanket yes or no
#[derive(Debug, Clone, Default)]
pub struct AutoDecider {
    /// Reason for every pend/petition; `None` cancels them
    pub reason: Option<String>,
    /// Answer to every confirmation
    pub confirm: bool,
}

impl AutoDecider {
    /// Accept everything with this reason
    pub fn accepting(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            confirm: true,
        }
    }
}

impl Decider for AutoDecider {
    fn pend_reason(&mut self, _pairs: &[Pair]) -> Option<String> {
        self.reason.clone()
    }

    fn confirm_petition(&mut self, _pairs: &[Pair]) -> bool {
        self.confirm
    }

    fn petition_reason(&mut self, _pairs: &[Pair]) -> Option<String> {
        self.reason.clone()
    }

    fn confirm_rescind_pend(&mut self, _pairs: &[Pair]) -> bool {
        self.confirm
    }

    fn confirm_rescind_petition(&mut self, _pairs: &[Pair]) -> bool {
        self.confirm
    }
}

/// Which transitions entering pairs may cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMode {
    /// Full four-way toggle
    #[default]
    Toggle,
    /// Only pend new pairs and rescind petitions; never remove
    AddOnly,
    /// Only petition current pairs and rescind pends; never add
    RemoveOnly,
}

/// What entering a batch of pairs did
#[derive(Debug, Default)]
pub struct PairOutcome {
    /// Newly pending (ADD for local services)
    pub pended: Vec<Pair>,
    /// Newly petitioned (DELETE for local services)
    pub petitioned: Vec<Pair>,
    /// Pends withdrawn
    pub rescinded_pends: Vec<Pair>,
    /// Petitions withdrawn
    pub rescinded_petitions: Vec<Pair>,
    /// Pairs refused, with why
    pub rejected: Vec<(Pair, TagError)>,
}

impl PairOutcome {
    /// Did the snapshot change?
    #[must_use]
    pub fn changed(&self) -> bool {
        !(self.pended.is_empty()
            && self.petitioned.is_empty()
            && self.rescinded_pends.is_empty()
            && self.rescinded_petitions.is_empty())
    }

    fn absorb(&mut self, other: PairOutcome) {
        self.pended.extend(other.pended);
        self.petitioned.extend(other.petitioned);
        self.rescinded_pends.extend(other.rescinded_pends);
        self.rescinded_petitions.extend(other.rescinded_petitions);
        self.rejected.extend(other.rejected);
    }
}

/// The graph a session's pairs live in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relationship {
    Siblings,
    Parents,
}

impl Relationship {
    fn of(content_type: ContentType) -> Result<Self> {
        match content_type {
            ContentType::TagSiblings => Ok(Self::Siblings),
            ContentType::TagParents => Ok(Self::Parents),
            ContentType::Mappings => Err(TagError::UnsupportedContentType { content_type }),
        }
    }
}

/// Validates and applies pair edits to one session
pub struct ConflictResolver<'a> {
    service: &'a Service,
    session: &'a mut EditSession,
    relationship: Relationship,
    auto_petition_reason: String,
    overrule_reason: String,
}

impl<'a> ConflictResolver<'a> {
    /// Wrap a session; refuses up front when the session is not a sibling or
    /// parent session, or the account cannot petition
    pub fn new(service: &'a Service, session: &'a mut EditSession) -> Result<Self> {
        let content_type = session.content_type;
        let relationship = Relationship::of(content_type)?;
        if !service.has_permission(content_type, PermissionAction::Petition) {
            return Err(TagError::PermissionDenied {
                service: service.key.clone(),
                content_type,
                action: ContentAction::Pend,
            });
        }

        Ok(Self {
            service,
            session,
            relationship,
            auto_petition_reason: DEFAULT_AUTO_PETITION_REASON.into(),
            overrule_reason: DEFAULT_OVERRULE_REASON.into(),
        })
    }

    /// Override the automatic and overrule reasons
    #[must_use]
    pub fn with_reasons(mut self, auto_petition_reason: impl Into<String>, overrule_reason: impl Into<String>) -> Self {
        self.auto_petition_reason = auto_petition_reason.into();
        self.overrule_reason = overrule_reason.into();
        self
    }

    fn content_type(&self) -> ContentType {
        self.session.content_type
    }

    fn can_overrule(&self) -> bool {
        self.service.has_permission(self.content_type(), PermissionAction::Overrule)
    }

    fn effective_pairs(&self) -> Vec<Pair> {
        self.session.current().effective_pairs().cloned().collect()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Would adding this pair keep the snapshot valid?
    pub fn can_add(&self, pair: &Pair) -> Result<()> {
        Validator::new(self.relationship, &self.effective_pairs()).accept(pair)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Enter one pair; a refusal comes back as the error
    pub fn enter_pair(&mut self, pair: Pair, decider: &mut dyn Decider) -> Result<PairOutcome> {
        let mut outcome = self.add_pairs(vec![pair], AddMode::Toggle, None, decider);
        match outcome.rejected.pop() {
            Some((_, err)) => Err(err),
            None => Ok(outcome),
        }
    }

    /// Petition or rescind every effective sibling pair that maps an old tag
    /// in `pairs` somewhere else, so the new pairs can be added
    pub fn auto_petition_conflicts(&mut self, pairs: &[Pair], decider: &mut dyn Decider) -> PairOutcome {
        let mut outcome = PairOutcome::default();
        if self.relationship != Relationship::Siblings {
            return outcome;
        }

        let olds_to_news: HashMap<Tag, Tag> =
            self.effective_pairs().into_iter().map(|Pair(old, new)| (old, new)).collect();

        let mut by_new: HashMap<&str, Vec<Pair>> = HashMap::new();
        for pair in pairs {
            if let Some(existing_new) = olds_to_news.get(pair.left()) {
                if existing_new != pair.right() {
                    by_new
                        .entry(pair.right())
                        .or_default()
                        .push(Pair::new(pair.left(), existing_new.clone()));
                }
            }
        }

        let mut groups: Vec<_> = by_new.into_iter().collect();
        groups.sort();
        for (new, conflicting) in groups {
            info!("Auto-petitioning {} pair(s) to reassign to {}", conflicting.len(), new);
            let reason = format!("{}{}", self.auto_petition_reason, new);
            outcome.absorb(self.add_pairs(conflicting, AddMode::RemoveOnly, Some(reason), decider));
        }

        outcome
    }

    /// Enter a batch of pairs.
    ///
    /// Each pair is classified by its current status: pending pairs are
    /// rescinded, petitioned pairs have their petition rescinded, current
    /// pairs are petitioned, and absent pairs are validated and pended. When
    /// the batch holds any addable new pairs, only those are acted on.
    pub fn add_pairs(
        &mut self,
        mut pairs: Vec<Pair>,
        mode: AddMode,
        default_reason: Option<String>,
        decider: &mut dyn Decider,
    ) -> PairOutcome {
        pairs.sort_by(|a, b| a.right().cmp(b.right()).then_with(|| a.left().cmp(b.left())));
        pairs.dedup();

        let mut outcome = PairOutcome::default();
        let mut new_pairs = Vec::new();
        let mut current_pairs = Vec::new();
        let mut pending_pairs = Vec::new();
        let mut petitioned_pairs = Vec::new();

        let mut validator = Validator::new(self.relationship, &self.effective_pairs());

        for pair in pairs {
            match self.session.current().status(&pair) {
                Some(RelationshipStatus::Pending) => {
                    if mode != AddMode::AddOnly {
                        pending_pairs.push(pair);
                    }
                }
                Some(RelationshipStatus::Petitioned) => {
                    if mode != AddMode::RemoveOnly {
                        petitioned_pairs.push(pair);
                    }
                }
                Some(RelationshipStatus::Current) => {
                    if mode != AddMode::AddOnly {
                        current_pairs.push(pair);
                    }
                }
                None => {
                    if mode == AddMode::RemoveOnly {
                        continue;
                    }
                    match validator.accept(&pair) {
                        Ok(()) => new_pairs.push(pair),
                        Err(err) => {
                            warn!("Rejected {}: {}", pair, err);
                            outcome.rejected.push((pair, err));
                        }
                    }
                }
            }
        }

        if new_pairs.is_empty() {
            self.petition_current(current_pairs, default_reason.as_deref(), decider, &mut outcome);
            self.rescind_pends(pending_pairs, decider, &mut outcome);
            self.rescind_petitions(petitioned_pairs, decider, &mut outcome);
        } else {
            self.pend_new(new_pairs, default_reason.as_deref(), decider, &mut outcome);
        }

        outcome
    }

    fn reason_for(
        &self,
        default_reason: Option<&str>,
        ask: impl FnOnce() -> Option<String>,
    ) -> Option<Option<String>> {
        if self.service.is_local() {
            return Some(None);
        }
        if let Some(reason) = default_reason {
            return Some(Some(reason.to_string()));
        }
        if self.can_overrule() {
            return Some(Some(self.overrule_reason.clone()));
        }
        ask().map(Some)
    }

    fn pend_new(&mut self, pairs: Vec<Pair>, default_reason: Option<&str>, decider: &mut dyn Decider, outcome: &mut PairOutcome) {
        let Some(reason) = self.reason_for(default_reason, || decider.pend_reason(&pairs)) else {
            debug!("Pend of {} pair(s) cancelled", pairs.len());
            return;
        };

        for pair in &pairs {
            if let Some(reason) = &reason {
                self.session.set_reason(pair.clone(), reason.clone());
            }
            self.session.current_mut().set(pair.clone(), RelationshipStatus::Pending);
        }
        debug!("Pended {} pair(s)", pairs.len());
        outcome.pended.extend(pairs);
    }

    fn petition_current(&mut self, pairs: Vec<Pair>, default_reason: Option<&str>, decider: &mut dyn Decider, outcome: &mut PairOutcome) {
        if pairs.is_empty() {
            return;
        }

        if !self.service.is_local() && default_reason.is_none() && !decider.confirm_petition(&pairs) {
            return;
        }

        let Some(reason) = self.reason_for(default_reason, || decider.petition_reason(&pairs)) else {
            debug!("Petition of {} pair(s) cancelled", pairs.len());
            return;
        };

        for pair in &pairs {
            if let Some(reason) = &reason {
                self.session.set_reason(pair.clone(), reason.clone());
            }
            self.session.current_mut().set(pair.clone(), RelationshipStatus::Petitioned);
        }
        debug!("Petitioned {} pair(s)", pairs.len());
        outcome.petitioned.extend(pairs);
    }

    fn rescind_pends(&mut self, pairs: Vec<Pair>, decider: &mut dyn Decider, outcome: &mut PairOutcome) {
        if pairs.is_empty() || !decider.confirm_rescind_pend(&pairs) {
            return;
        }
        for pair in &pairs {
            self.session.current_mut().remove(pair);
        }
        outcome.rescinded_pends.extend(pairs);
    }

    /// A rescinded petition makes the pair effective again, so it is
    /// validated like a new pair; refused pairs stay petitioned.
    fn rescind_petitions(&mut self, pairs: Vec<Pair>, decider: &mut dyn Decider, outcome: &mut PairOutcome) {
        if pairs.is_empty() {
            return;
        }

        let mut validator = Validator::new(self.relationship, &self.effective_pairs());
        let mut restorable = Vec::new();
        for pair in pairs {
            match validator.accept(&pair) {
                Ok(()) => restorable.push(pair),
                Err(err) => {
                    warn!("Cannot rescind petition on {}: {}", pair, err);
                    outcome.rejected.push((pair, err));
                }
            }
        }

        if restorable.is_empty() || !decider.confirm_rescind_petition(&restorable) {
            return;
        }
        for pair in &restorable {
            self.session.current_mut().set(pair.clone(), RelationshipStatus::Current);
        }
        outcome.rescinded_petitions.extend(restorable);
    }
}

/// Incremental checker: pairs accepted earlier in a batch count as effective
enum Validator {
    Siblings(HashMap<Tag, Tag>),
    Parents(TagGraph),
}

impl Validator {
    fn new(relationship: Relationship, effective: &[Pair]) -> Self {
        match relationship {
            Relationship::Siblings => Self::Siblings(
                effective
                    .iter()
                    .map(|pair| (pair.0.clone(), pair.1.clone()))
                    .collect(),
            ),
            Relationship::Parents => Self::Parents(TagGraph::from_pairs(effective)),
        }
    }

    fn accept(&mut self, pair: &Pair) -> Result<()> {
        match self {
            Self::Siblings(olds_to_news) => {
                check_sibling(olds_to_news, pair)?;
                olds_to_news.insert(pair.0.clone(), pair.1.clone());
            }
            Self::Parents(graph) => {
                check_parent(graph, pair)?;
                graph.add_pair(pair);
            }
        }
        Ok(())
    }
}

/// Sibling rules: no self pair, one new per old, no loop through the chain
fn check_sibling(olds_to_news: &HashMap<Tag, Tag>, pair: &Pair) -> Result<()> {
    let (old, new) = (pair.left(), pair.right());

    if old == new {
        return Err(TagError::SelfReferential { tag: old.to_string() });
    }

    if let Some(existing_new) = olds_to_news.get(old) {
        if existing_new != new {
            return Err(TagError::AmbiguousSibling {
                old: old.to_string(),
                existing_new: existing_new.clone(),
                requested_new: new.to_string(),
            });
        }
    }

    let mut chain = vec![old.to_string(), new.to_string()];
    let mut seen: HashSet<&str> = HashSet::new();
    let mut next = new;
    while let Some(following) = olds_to_news.get(next) {
        if following == old {
            chain.push(following.clone());
            return Err(TagError::LoopDetected { pair: pair.clone(), chain });
        }
        if !seen.insert(following.as_str()) {
            let mut tags: Vec<String> = seen.into_iter().map(str::to_string).collect();
            tags.sort();
            return Err(TagError::PreexistingLoop { pair: pair.clone(), tags });
        }
        chain.push(following.clone());
        next = following;
    }

    Ok(())
}

/// Parent rules: no self pair, and the parent must not already reach the child
fn check_parent(graph: &TagGraph, pair: &Pair) -> Result<()> {
    let (child, parent) = (pair.left(), pair.right());

    if child == parent {
        return Err(TagError::SelfReferential { tag: child.to_string() });
    }

    if let Some(path) = graph.path(parent, child) {
        let mut chain = vec![child.to_string()];
        chain.extend(path);
        return Err(TagError::LoopDetected { pair: pair.clone(), chain });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusStore;
    use crate::types::{ServiceKey, ServiceKind};
    use std::collections::{BTreeMap, BTreeSet};

    fn pair(a: &str, b: &str) -> Pair {
        Pair::new(a, b)
    }

    fn repository(actions: &[PermissionAction]) -> Service {
        let grants: BTreeSet<PermissionAction> = actions.iter().copied().collect();
        let permissions = BTreeMap::from([
            (ContentType::TagSiblings, grants.clone()),
            (ContentType::TagParents, grants),
        ]);
        Service::repository("public tag repository", permissions)
    }

    fn session(content_type: ContentType, entries: &[(&str, &str, RelationshipStatus)]) -> EditSession {
        let mut store = StatusStore::new();
        for (a, b, status) in entries {
            store.set(pair(a, b), *status);
        }
        EditSession::open(ServiceKey::from_name("test"), content_type, store)
    }

    #[test]
    fn test_permission_checked_before_anything() {
        let service = repository(&[]);
        let mut session = session(ContentType::TagSiblings, &[]);
        let err = ConflictResolver::new(&service, &mut session).err().unwrap();
        assert!(matches!(err, TagError::PermissionDenied { .. }));
        assert!(!session.is_modified());
    }

    #[test]
    fn test_sibling_self_pair_rejected() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagSiblings, &[]);
        let resolver = ConflictResolver::new(&service, &mut session).unwrap();
        assert!(matches!(resolver.can_add(&pair("a", "a")), Err(TagError::SelfReferential { .. })));
    }

    #[test]
    fn test_sibling_ambiguity_rejected() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagSiblings, &[("a", "b", RelationshipStatus::Current)]);
        let resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let err = resolver.can_add(&pair("a", "c")).unwrap_err();
        assert!(matches!(err, TagError::AmbiguousSibling { ref existing_new, .. } if existing_new == "b"));
    }

    #[test]
    fn test_sibling_loop_rejected() {
        let service = Service::local("my tags");
        let mut session = session(
            ContentType::TagSiblings,
            &[("b", "c", RelationshipStatus::Current), ("c", "a", RelationshipStatus::Pending)],
        );
        let resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let err = resolver.can_add(&pair("a", "b")).unwrap_err();
        match err {
            TagError::LoopDetected { chain, .. } => assert_eq!(chain, vec!["a", "b", "c", "a"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_sibling_preexisting_loop_rejected() {
        let service = Service::local("my tags");
        let mut session = session(
            ContentType::TagSiblings,
            &[("x", "y", RelationshipStatus::Current), ("y", "x", RelationshipStatus::Current)],
        );
        let resolver = ConflictResolver::new(&service, &mut session).unwrap();

        assert!(matches!(resolver.can_add(&pair("a", "x")), Err(TagError::PreexistingLoop { .. })));
    }

    #[test]
    fn test_petitioned_pair_does_not_block() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagSiblings, &[("a", "b", RelationshipStatus::Petitioned)]);
        let resolver = ConflictResolver::new(&service, &mut session).unwrap();
        assert!(resolver.can_add(&pair("a", "c")).is_ok());
    }

    #[test]
    fn test_parent_loop_rejected() {
        let service = Service::local("my tags");
        let mut session = session(
            ContentType::TagParents,
            &[("cat", "animal", RelationshipStatus::Current), ("animal", "living_thing", RelationshipStatus::Current)],
        );
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let err = resolver
            .enter_pair(pair("living_thing", "cat"), &mut AutoDecider::accepting("x"))
            .unwrap_err();
        match err {
            TagError::LoopDetected { chain, .. } => {
                assert_eq!(chain, vec!["living_thing", "cat", "animal", "living_thing"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!session.is_modified());
    }

    #[test]
    fn test_batch_cannot_sneak_in_a_cycle() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagParents, &[]);
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let outcome = resolver.add_pairs(
            vec![pair("a", "b"), pair("b", "a")],
            AddMode::Toggle,
            None,
            &mut AutoDecider::accepting("x"),
        );
        assert_eq!(outcome.pended.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[test]
    fn test_repository_toggle_cycle() {
        let service = repository(&[PermissionAction::Petition]);
        let mut session = session(ContentType::TagParents, &[("cat", "animal", RelationshipStatus::Current)]);
        let mut decider = AutoDecider::accepting("because");

        {
            let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();
            let outcome = resolver.enter_pair(pair("dog", "animal"), &mut decider).unwrap();
            assert_eq!(outcome.pended, vec![pair("dog", "animal")]);
            let outcome = resolver.enter_pair(pair("cat", "animal"), &mut decider).unwrap();
            assert_eq!(outcome.petitioned, vec![pair("cat", "animal")]);
        }
        assert_eq!(session.current().status(&pair("dog", "animal")), Some(RelationshipStatus::Pending));
        assert_eq!(session.current().status(&pair("cat", "animal")), Some(RelationshipStatus::Petitioned));
        assert_eq!(session.reason(&pair("dog", "animal")), Some("because"));

        {
            let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();
            let outcome = resolver.enter_pair(pair("dog", "animal"), &mut decider).unwrap();
            assert_eq!(outcome.rescinded_pends, vec![pair("dog", "animal")]);
            let outcome = resolver.enter_pair(pair("cat", "animal"), &mut decider).unwrap();
            assert_eq!(outcome.rescinded_petitions, vec![pair("cat", "animal")]);
        }
        assert!(!session.is_modified());
        assert!(session.content_updates(ServiceKind::Repository).is_empty());
    }

    #[test]
    fn test_cancelled_reason_changes_nothing() {
        let service = repository(&[PermissionAction::Petition]);
        let mut session = session(ContentType::TagParents, &[]);
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let outcome = resolver
            .enter_pair(pair("cat", "animal"), &mut AutoDecider::default())
            .unwrap();
        assert!(!outcome.changed());
        assert!(!session.is_modified());
    }

    #[test]
    fn test_overrule_uses_admin_reason() {
        let service = repository(&[PermissionAction::Petition, PermissionAction::Overrule]);
        let mut session = session(ContentType::TagSiblings, &[]);
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        resolver.enter_pair(pair("a", "b"), &mut AutoDecider::default()).unwrap();
        assert_eq!(session.reason(&pair("a", "b")), Some("admin"));
    }

    #[test]
    fn test_local_service_needs_no_reason() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagSiblings, &[("x", "y", RelationshipStatus::Current)]);
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();
        let mut decider = AutoDecider::default();

        resolver.enter_pair(pair("a", "b"), &mut decider).unwrap();
        resolver.enter_pair(pair("x", "y"), &mut decider).unwrap();
        assert_eq!(session.reason(&pair("a", "b")), None);

        let updates = session.content_updates(ServiceKind::Local);
        let actions: Vec<ContentAction> = updates.iter().map(|u| u.action).collect();
        assert_eq!(actions, vec![ContentAction::Add, ContentAction::Delete]);
    }

    #[test]
    fn test_auto_petition_reassigns() {
        let service = repository(&[PermissionAction::Petition]);
        let mut session = session(
            ContentType::TagSiblings,
            &[("a", "b", RelationshipStatus::Current), ("c", "d", RelationshipStatus::Pending)],
        );
        let mut decider = AutoDecider::accepting("reassign");
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let wanted = vec![pair("a", "z"), pair("c", "z")];
        let outcome = resolver.auto_petition_conflicts(&wanted, &mut decider);
        assert_eq!(outcome.petitioned, vec![pair("a", "b")]);
        assert_eq!(outcome.rescinded_pends, vec![pair("c", "d")]);

        let outcome = resolver.add_pairs(wanted, AddMode::Toggle, None, &mut decider);
        assert_eq!(outcome.pended.len(), 2);
        assert!(outcome.rejected.is_empty());

        assert_eq!(session.reason(&pair("a", "b")), Some("AUTO-PETITION TO REASSIGN TO: z"));
    }

    #[test]
    fn test_add_only_skips_removals() {
        let service = Service::local("my tags");
        let mut session = session(
            ContentType::TagParents,
            &[("a", "b", RelationshipStatus::Current), ("c", "d", RelationshipStatus::Pending)],
        );
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let outcome = resolver.add_pairs(
            vec![pair("a", "b"), pair("c", "d")],
            AddMode::AddOnly,
            None,
            &mut AutoDecider::accepting("x"),
        );
        assert!(!outcome.changed());
    }

    #[test]
    fn test_mappings_session_refused() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::Mappings, &[]);
        let err = ConflictResolver::new(&service, &mut session).err().unwrap();
        assert!(matches!(err, TagError::UnsupportedContentType { content_type: ContentType::Mappings }));
    }

    #[test]
    fn test_rescinding_petition_cannot_make_sibling_ambiguous() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagSiblings, &[("a", "b", RelationshipStatus::Current)]);
        let mut decider = AutoDecider::accepting("x");

        {
            let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();
            let outcome = resolver.auto_petition_conflicts(&[pair("a", "c")], &mut decider);
            assert_eq!(outcome.petitioned, vec![pair("a", "b")]);
            resolver.enter_pair(pair("a", "c"), &mut decider).unwrap();

            let err = resolver.enter_pair(pair("a", "b"), &mut decider).unwrap_err();
            assert!(matches!(err, TagError::AmbiguousSibling { ref existing_new, .. } if existing_new == "c"));
        }

        assert_eq!(session.current().status(&pair("a", "b")), Some(RelationshipStatus::Petitioned));
        assert_eq!(session.current().status(&pair("a", "c")), Some(RelationshipStatus::Pending));
    }

    #[test]
    fn test_rescinding_petition_cannot_close_parent_loop() {
        let service = Service::local("my tags");
        let mut session = session(ContentType::TagParents, &[("cat", "animal", RelationshipStatus::Current)]);
        let mut decider = AutoDecider::accepting("x");

        {
            let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();
            let outcome = resolver.enter_pair(pair("cat", "animal"), &mut decider).unwrap();
            assert_eq!(outcome.petitioned, vec![pair("cat", "animal")]);
            resolver.enter_pair(pair("animal", "cat"), &mut decider).unwrap();

            let err = resolver.enter_pair(pair("cat", "animal"), &mut decider).unwrap_err();
            assert!(matches!(err, TagError::LoopDetected { .. }));
        }

        assert_eq!(session.current().status(&pair("cat", "animal")), Some(RelationshipStatus::Petitioned));
        let graph = TagGraph::from_pairs(session.current().effective_pairs());
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_rescinding_petition_still_allowed_when_valid() {
        let service = Service::local("my tags");
        let mut session = session(
            ContentType::TagParents,
            &[("cat", "animal", RelationshipStatus::Petitioned), ("dog", "animal", RelationshipStatus::Current)],
        );
        let mut resolver = ConflictResolver::new(&service, &mut session).unwrap();

        let outcome = resolver
            .enter_pair(pair("cat", "animal"), &mut AutoDecider::accepting("x"))
            .unwrap();
        assert_eq!(outcome.rescinded_petitions, vec![pair("cat", "animal")]);
        assert!(outcome.rejected.is_empty());
    }
}
