// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-service sibling and parent resolution
//!
//! Each manager owns one graph per service behind a mutex. Graphs are rebuilt
//! wholesale with `set_service` whenever a service's effective pairs change;
//! lookups against an unknown service behave as if it had no pairs.

use crate::error::Result;
use crate::graph::{ParentGraph, SiblingGraph, DEFAULT_MAX_CHAIN};
use crate::types::{Pair, ServiceKey, Tag};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sibling graphs keyed by service
#[derive(Debug)]
pub struct TagSiblingsManager {
    graphs: Mutex<HashMap<ServiceKey, SiblingGraph>>,
    max_chain: usize,
}

impl Default for TagSiblingsManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHAIN)
    }
}

impl TagSiblingsManager {
    /// Empty manager with a collapse walk cap
    #[must_use]
    pub fn new(max_chain: usize) -> Self {
        Self {
            graphs: Mutex::new(HashMap::new()),
            max_chain,
        }
    }

    /// Replace a service's graph with one built from its effective pairs
    pub fn set_service<'a>(
        &self,
        service: &ServiceKey,
        pairs: impl IntoIterator<Item = &'a Pair>,
        known_tags: Option<HashSet<Tag>>,
    ) {
        let mut graph = SiblingGraph::from_pairs(pairs).with_max_chain(self.max_chain);
        if let Some(cycle) = graph.edges().find_cycle() {
            warn!("Sibling loop in {}: {}", service, cycle.join(", "));
        }
        if let Some(known_tags) = known_tags {
            graph = graph.with_known_tags(known_tags);
        }
        debug!("Loaded {} sibling pairs for {}", graph.edges().edge_count(), service);
        lock(&self.graphs).insert(service.clone(), graph);
    }

    /// Forget a service
    pub fn remove_service(&self, service: &ServiceKey) {
        lock(&self.graphs).remove(service);
    }

    fn with_graph<T>(&self, service: &ServiceKey, f: impl FnOnce(&SiblingGraph) -> T) -> T {
        let graphs = lock(&self.graphs);
        match graphs.get(service) {
            Some(graph) => f(graph),
            None => f(&SiblingGraph::default()),
        }
    }

    /// Ideal tag for `tag`
    pub fn collapse_tag(&self, service: &ServiceKey, tag: &str, strict: bool) -> Result<Tag> {
        self.with_graph(service, |graph| graph.collapse_tag(tag, strict))
    }

    /// Ideal tags for a set of tags
    pub fn collapse_tags(&self, service: &ServiceKey, tags: &HashSet<Tag>, strict: bool) -> Result<HashSet<Tag>> {
        self.with_graph(service, |graph| graph.collapse_tags(tags, strict))
    }

    /// Direct replacement, one hop
    #[must_use]
    pub fn get_sibling(&self, service: &ServiceKey, tag: &str) -> Option<Tag> {
        self.with_graph(service, |graph| graph.get_sibling(tag).cloned())
    }

    /// Everything in `tag`'s sibling chain
    pub fn get_all_siblings(&self, service: &ServiceKey, tag: &str) -> Result<HashSet<Tag>> {
        self.with_graph(service, |graph| graph.get_all_siblings(tag))
    }
}

/// Parent graphs keyed by service
#[derive(Debug, Default)]
pub struct TagParentsManager {
    graphs: Mutex<HashMap<ServiceKey, ParentGraph>>,
}

impl TagParentsManager {
    /// Empty manager
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a service's graph with one built from its effective pairs
    pub fn set_service<'a>(
        &self,
        service: &ServiceKey,
        pairs: impl IntoIterator<Item = &'a Pair>,
        known_tags: Option<HashSet<Tag>>,
    ) {
        let mut graph = ParentGraph::from_pairs(pairs);
        if let Some(cycle) = graph.edges().find_cycle() {
            warn!("Parent loop in {}: {}", service, cycle.join(", "));
        }
        if let Some(known_tags) = known_tags {
            graph = graph.with_known_tags(known_tags);
        }
        debug!("Loaded {} parent pairs for {}", graph.edges().edge_count(), service);
        lock(&self.graphs).insert(service.clone(), graph);
    }

    /// Forget a service
    pub fn remove_service(&self, service: &ServiceKey) {
        lock(&self.graphs).remove(service);
    }

    fn with_graph<T>(&self, service: &ServiceKey, f: impl FnOnce(&ParentGraph) -> T) -> T {
        let graphs = lock(&self.graphs);
        match graphs.get(service) {
            Some(graph) => f(graph),
            None => f(&ParentGraph::default()),
        }
    }

    /// Tags plus every ancestor
    #[must_use]
    pub fn expand_tags(&self, service: &ServiceKey, tags: &HashSet<Tag>, strict: bool) -> HashSet<Tag> {
        self.with_graph(service, |graph| graph.expand_tags(tags, strict))
    }

    /// Direct parents
    #[must_use]
    pub fn get_parents(&self, service: &ServiceKey, tag: &str) -> HashSet<Tag> {
        self.with_graph(service, |graph| graph.get_parents(tag))
    }

    /// Direct children
    #[must_use]
    pub fn get_children(&self, service: &ServiceKey, tag: &str) -> HashSet<Tag> {
        self.with_graph(service, |graph| graph.get_children(tag))
    }

    /// All ancestors
    #[must_use]
    pub fn get_ancestors(&self, service: &ServiceKey, tag: &str) -> HashSet<Tag> {
        self.with_graph(service, |graph| graph.get_ancestors(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn tags(items: &[&str]) -> HashSet<Tag> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_services_are_independent() {
        let manager = TagSiblingsManager::default();
        let mine = ServiceKey::from_name("my tags");
        let ptr = ServiceKey::from_name("ptr");

        manager.set_service(&mine, &[Pair::new("a", "b")], None);
        manager.set_service(&ptr, &[Pair::new("a", "c")], None);

        assert_eq!(manager.collapse_tag(&mine, "a", false).unwrap(), "b");
        assert_eq!(manager.collapse_tag(&ptr, "a", false).unwrap(), "c");
        assert_eq!(
            manager.collapse_tag(&ServiceKey::from_name("nobody"), "a", false).unwrap(),
            "a"
        );
    }

    #[test]
    fn test_set_service_replaces() {
        let manager = TagSiblingsManager::default();
        let service = ServiceKey::from_name("my tags");

        manager.set_service(&service, &[Pair::new("a", "b")], None);
        manager.set_service(&service, &[Pair::new("x", "y")], None);

        assert_eq!(manager.get_sibling(&service, "a"), None);
        assert_eq!(manager.get_sibling(&service, "x").as_deref(), Some("y"));

        manager.remove_service(&service);
        assert_eq!(manager.get_sibling(&service, "x"), None);
    }

    #[test]
    fn test_known_tags_drive_strict_mode() {
        let manager = TagSiblingsManager::default();
        let service = ServiceKey::from_name("my tags");
        manager.set_service(&service, &[Pair::new("a", "b")], Some(tags(&["a"])));

        assert_eq!(manager.collapse_tag(&service, "a", true).unwrap(), "a");
        assert_eq!(manager.collapse_tags(&service, &tags(&["a"]), false).unwrap(), tags(&["b"]));
    }

    #[test]
    fn test_cap_configurable() {
        let manager = TagSiblingsManager::new(4);
        let service = ServiceKey::from_name("broken");
        manager.set_service(&service, &[Pair::new("a", "b"), Pair::new("b", "a")], None);

        assert!(manager.collapse_tag(&service, "a", false).is_err());
    }

    #[test]
    fn test_parents_lookups() {
        let manager = TagParentsManager::new();
        let service = ServiceKey::from_name("my tags");
        manager.set_service(
            &service,
            &[Pair::new("cat", "animal"), Pair::new("dog", "animal"), Pair::new("animal", "living_thing")],
            None,
        );

        assert_eq!(manager.get_parents(&service, "cat"), tags(&["animal"]));
        assert_eq!(manager.get_children(&service, "animal"), tags(&["cat", "dog"]));
        assert_eq!(manager.get_ancestors(&service, "dog"), tags(&["animal", "living_thing"]));
        assert_eq!(
            manager.expand_tags(&service, &tags(&["cat"]), false),
            tags(&["cat", "animal", "living_thing"])
        );
    }

    #[test]
    fn test_concurrent_reads() {
        let manager = Arc::new(TagParentsManager::new());
        let service = ServiceKey::from_name("my tags");
        manager.set_service(&service, &[Pair::new("cat", "animal")], None);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let service = service.clone();
                thread::spawn(move || manager.expand_tags(&service, &tags(&["cat"]), false).len())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
    }
}
