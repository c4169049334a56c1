// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Relationship graphs: sibling collapse and parent expansion
//!
//! Both variants sit on the same petgraph-backed [`TagGraph`]. Sibling
//! graphs have out-degree at most one (old -> new is a function); parent
//! graphs are a DAG of child -> parent edges.

use crate::error::{Result, TagError};
use crate::types::{Pair, Tag};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::warn;

/// Default cap on a collapse walk before the graph is declared broken
pub const DEFAULT_MAX_CHAIN: usize = 10_000;

/// Directed tag graph with a tag -> node index
#[derive(Debug, Clone, Default)]
pub struct TagGraph {
    graph: DiGraph<Tag, ()>,
    node_indices: HashMap<Tag, NodeIndex>,
}

impl TagGraph {
    /// Build from pairs, one edge per pair
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a Pair>) -> Self {
        let mut graph = Self::default();
        for pair in pairs {
            graph.add_pair(pair);
        }
        graph
    }

    fn ensure_node(&mut self, tag: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(tag) {
            return idx;
        }
        let idx = self.graph.add_node(tag.to_string());
        self.node_indices.insert(tag.to_string(), idx);
        idx
    }

    /// Add an edge a -> b (idempotent)
    pub fn add_pair(&mut self, pair: &Pair) {
        let from = self.ensure_node(pair.left());
        let to = self.ensure_node(pair.right());
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    /// Does any edge touch this tag?
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.node_indices.contains_key(tag)
    }

    /// Tags one hop forward
    #[must_use]
    pub fn successors(&self, tag: &str) -> Vec<&Tag> {
        self.neighbors(tag, Direction::Outgoing)
    }

    /// Tags one hop backward
    #[must_use]
    pub fn predecessors(&self, tag: &str) -> Vec<&Tag> {
        self.neighbors(tag, Direction::Incoming)
    }

    fn neighbors(&self, tag: &str, direction: Direction) -> Vec<&Tag> {
        match self.node_indices.get(tag) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every tag reachable forward from `tag`, excluding `tag` itself
    #[must_use]
    pub fn reachable_from(&self, tag: &str) -> Vec<&Tag> {
        let Some(&start) = self.node_indices.get(tag) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut found = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                found.push(&self.graph[idx]);
            }
        }
        found
    }

    /// Shortest forward path `from` .. `to`, both ends included
    #[must_use]
    pub fn path(&self, from: &str, to: &str) -> Option<Vec<Tag>> {
        let &start = self.node_indices.get(from)?;
        let &goal = self.node_indices.get(to)?;

        let mut came_from: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut seen = HashSet::from([start]);

        while let Some(idx) = queue.pop_front() {
            if idx == goal {
                let mut chain = vec![self.graph[idx].clone()];
                let mut cursor = idx;
                while let Some(&prev) = came_from.get(&cursor) {
                    chain.push(self.graph[prev].clone());
                    cursor = prev;
                }
                chain.reverse();
                return Some(chain);
            }
            for next in self.graph.neighbors(idx) {
                if seen.insert(next) {
                    came_from.insert(next, idx);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// Tags of some cycle, if the graph holds one
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<Tag>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| {
                component.len() > 1
                    || self.graph.find_edge(component[0], component[0]).is_some()
            })
            .map(|component| {
                let mut tags: Vec<Tag> = component.iter().map(|&idx| self.graph[idx].clone()).collect();
                tags.sort();
                tags
            })
    }

    /// Number of tags
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of pairs
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Tags a service already knows, used by strict resolution
fn is_known(known_tags: Option<&HashSet<Tag>>, tag: &str) -> bool {
    known_tags.map_or(true, |known| known.contains(tag))
}

// =============================================================================
// Siblings
// =============================================================================

/// Effective old -> new sibling pairs for one service
#[derive(Debug, Clone)]
pub struct SiblingGraph {
    edges: TagGraph,
    known_tags: Option<HashSet<Tag>>,
    max_chain: usize,
}

impl Default for SiblingGraph {
    fn default() -> Self {
        Self {
            edges: TagGraph::default(),
            known_tags: None,
            max_chain: DEFAULT_MAX_CHAIN,
        }
    }
}

impl SiblingGraph {
    /// Build from effective pairs.
    ///
    /// If the data maps one old tag to several new ones, the lowest new tag
    /// wins and the rest are dropped with a warning.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a Pair>) -> Self {
        let mut olds_to_news: BTreeMap<&str, &str> = BTreeMap::new();
        for pair in pairs {
            match olds_to_news.get(pair.left()).copied() {
                Some(existing) if existing != pair.right() => {
                    warn!("Ambiguous sibling data for '{}': '{}' vs '{}'", pair.left(), existing, pair.right());
                    if pair.right() < existing {
                        olds_to_news.insert(pair.left(), pair.right());
                    }
                }
                _ => {
                    olds_to_news.insert(pair.left(), pair.right());
                }
            }
        }

        let pairs: Vec<Pair> = olds_to_news.into_iter().map(|(old, new)| Pair::new(old, new)).collect();
        Self {
            edges: TagGraph::from_pairs(&pairs),
            ..Self::default()
        }
    }

    /// Restrict strict resolution to these tags
    #[must_use]
    pub fn with_known_tags(mut self, known_tags: HashSet<Tag>) -> Self {
        self.known_tags = Some(known_tags);
        self
    }

    /// Override the walk cap
    #[must_use]
    pub fn with_max_chain(mut self, max_chain: usize) -> Self {
        self.max_chain = max_chain;
        self
    }

    /// One hop: what `tag` is directly replaced by
    #[must_use]
    pub fn get_sibling(&self, tag: &str) -> Option<&Tag> {
        self.edges.successors(tag).into_iter().next()
    }

    /// Follow old -> new until a fixed point.
    ///
    /// With `strict`, the tag and every tag on its chain must be known to the
    /// service, otherwise the tag is returned as-is.
    pub fn collapse_tag(&self, tag: &str, strict: bool) -> Result<Tag> {
        let known = if strict { self.known_tags.as_ref() } else { None };
        if !is_known(known, tag) {
            return Ok(tag.to_string());
        }

        let mut current = tag;
        let mut steps = 0;
        while let Some(next) = self.get_sibling(current) {
            steps += 1;
            if steps > self.max_chain {
                return Err(TagError::InvariantViolation {
                    tag: tag.to_string(),
                    limit: self.max_chain,
                });
            }
            if !is_known(known, next) {
                return Ok(tag.to_string());
            }
            current = next;
        }

        Ok(current.to_string())
    }

    /// Collapse every tag
    pub fn collapse_tags<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>, strict: bool) -> Result<HashSet<Tag>> {
        tags.into_iter().map(|tag| self.collapse_tag(tag, strict)).collect()
    }

    /// Everything in the same chain: every tag collapsing to the same ideal,
    /// the ideal itself, and `tag`
    pub fn get_all_siblings(&self, tag: &str) -> Result<HashSet<Tag>> {
        let ideal = self.collapse_tag(tag, false)?;

        let mut found: HashSet<Tag> = HashSet::from([tag.to_string(), ideal.clone()]);
        let mut queue = VecDeque::from([ideal]);
        while let Some(current) = queue.pop_front() {
            for old in self.edges.predecessors(&current) {
                if found.insert(old.clone()) {
                    queue.push_back(old.clone());
                }
            }
        }

        Ok(found)
    }

    /// Shared graph, for validation
    #[must_use]
    pub fn edges(&self) -> &TagGraph {
        &self.edges
    }
}

// =============================================================================
// Parents
// =============================================================================

/// Effective child -> parent pairs for one service
#[derive(Debug, Clone, Default)]
pub struct ParentGraph {
    edges: TagGraph,
    known_tags: Option<HashSet<Tag>>,
}

impl ParentGraph {
    /// Build from effective pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a Pair>) -> Self {
        Self {
            edges: TagGraph::from_pairs(pairs),
            known_tags: None,
        }
    }

    /// Restrict strict expansion to these tags
    #[must_use]
    pub fn with_known_tags(mut self, known_tags: HashSet<Tag>) -> Self {
        self.known_tags = Some(known_tags);
        self
    }

    /// Direct parents only
    #[must_use]
    pub fn get_parents(&self, tag: &str) -> HashSet<Tag> {
        self.edges.successors(tag).into_iter().cloned().collect()
    }

    /// Direct children only
    #[must_use]
    pub fn get_children(&self, tag: &str) -> HashSet<Tag> {
        self.edges.predecessors(tag).into_iter().cloned().collect()
    }

    /// Every ancestor of `tag`
    #[must_use]
    pub fn get_ancestors(&self, tag: &str) -> HashSet<Tag> {
        self.edges.reachable_from(tag).into_iter().cloned().collect()
    }

    /// Inputs plus all their ancestors.
    ///
    /// With `strict`, unknown input tags are kept but not expanded, and the
    /// walk does not pass through unknown ancestors.
    #[must_use]
    pub fn expand_tags<'a>(&self, tags: impl IntoIterator<Item = &'a Tag>, strict: bool) -> HashSet<Tag> {
        let known = if strict { self.known_tags.as_ref() } else { None };
        let mut expanded = HashSet::new();
        let mut queue = VecDeque::new();

        for tag in tags {
            if expanded.insert(tag.clone()) && is_known(known, tag) {
                queue.push_back(tag.clone());
            }
        }

        while let Some(tag) = queue.pop_front() {
            for parent in self.edges.successors(&tag) {
                if is_known(known, parent) && expanded.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
        }

        expanded
    }

    /// Shared graph, for validation
    #[must_use]
    pub fn edges(&self) -> &TagGraph {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> HashSet<Tag> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_collapse_single_hop() {
        let graph = SiblingGraph::from_pairs(&[Pair::new("color:red", "colour:red")]);
        assert_eq!(graph.collapse_tag("color:red", false).unwrap(), "colour:red");
        assert_eq!(graph.collapse_tag("colour:red", false).unwrap(), "colour:red");
        assert_eq!(graph.collapse_tag("unrelated", false).unwrap(), "unrelated");
    }

    #[test]
    fn test_collapse_chain_and_fixed_point() {
        let graph = SiblingGraph::from_pairs(&[Pair::new("a", "b"), Pair::new("b", "c"), Pair::new("c", "d")]);
        let once = graph.collapse_tag("a", false).unwrap();
        assert_eq!(once, "d");
        assert_eq!(graph.collapse_tag(&once, false).unwrap(), once);
    }

    #[test]
    fn test_collapse_cycle_hits_cap() {
        let graph = SiblingGraph::from_pairs(&[Pair::new("a", "b"), Pair::new("b", "a")]).with_max_chain(16);
        let err = graph.collapse_tag("a", false).unwrap_err();
        assert!(matches!(err, TagError::InvariantViolation { limit: 16, .. }));
    }

    #[test]
    fn test_collapse_strict_requires_known_chain() {
        let pairs = [Pair::new("a", "b"), Pair::new("b", "c")];

        let graph = SiblingGraph::from_pairs(&pairs).with_known_tags(tags(&["a", "b", "c"]));
        assert_eq!(graph.collapse_tag("a", true).unwrap(), "c");

        let graph = SiblingGraph::from_pairs(&pairs).with_known_tags(tags(&["a", "b"]));
        assert_eq!(graph.collapse_tag("a", true).unwrap(), "a");
        assert_eq!(graph.collapse_tag("a", false).unwrap(), "c");

        let graph = SiblingGraph::from_pairs(&pairs).with_known_tags(tags(&["b", "c"]));
        assert_eq!(graph.collapse_tag("a", true).unwrap(), "a");
    }

    #[test]
    fn test_ambiguous_data_keeps_lowest_new() {
        let graph = SiblingGraph::from_pairs(&[Pair::new("a", "z"), Pair::new("a", "m")]);
        assert_eq!(graph.get_sibling("a").map(String::as_str), Some("m"));
    }

    #[test]
    fn test_all_siblings() {
        let graph = SiblingGraph::from_pairs(&[
            Pair::new("a", "c"),
            Pair::new("b", "c"),
            Pair::new("c", "d"),
            Pair::new("x", "y"),
        ]);
        assert_eq!(graph.get_all_siblings("a").unwrap(), tags(&["a", "b", "c", "d"]));
        assert_eq!(graph.get_all_siblings("lonely").unwrap(), tags(&["lonely"]));
    }

    #[test]
    fn test_expand_transitive() {
        let graph = ParentGraph::from_pairs(&[Pair::new("cat", "animal"), Pair::new("animal", "living_thing")]);
        let expanded = graph.expand_tags(&tags(&["cat"]), false);
        assert_eq!(expanded, tags(&["cat", "animal", "living_thing"]));
        assert_eq!(graph.get_parents("cat"), tags(&["animal"]));
        assert_eq!(graph.get_children("animal"), tags(&["cat"]));
    }

    #[test]
    fn test_expand_diamond() {
        let graph = ParentGraph::from_pairs(&[
            Pair::new("kitten", "cat"),
            Pair::new("kitten", "young"),
            Pair::new("cat", "animal"),
            Pair::new("young", "animal"),
        ]);
        assert_eq!(graph.get_ancestors("kitten"), tags(&["cat", "young", "animal"]));
    }

    #[test]
    fn test_expand_strict_stops_at_unknown() {
        let graph = ParentGraph::from_pairs(&[Pair::new("cat", "animal"), Pair::new("animal", "living_thing")])
            .with_known_tags(tags(&["cat", "animal"]));
        assert_eq!(graph.expand_tags(&tags(&["cat"]), true), tags(&["cat", "animal"]));
        assert_eq!(graph.expand_tags(&tags(&["dog"]), true), tags(&["dog"]));
    }

    #[test]
    fn test_path_and_cycle_detection() {
        let graph = TagGraph::from_pairs(&[Pair::new("a", "b"), Pair::new("b", "c")]);
        assert_eq!(graph.path("a", "c"), Some(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(graph.path("c", "a"), None);
        assert!(graph.find_cycle().is_none());

        let graph = TagGraph::from_pairs(&[Pair::new("a", "b"), Pair::new("b", "c"), Pair::new("c", "a")]);
        assert_eq!(graph.find_cycle(), Some(vec!["a".into(), "b".into(), "c".into()]));
    }
}
