// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Whitelist/blacklist tag filters over tag slices
//!
//! A tag is checked against every slice that covers it (the exact tag, its
//! namespace, all-namespaced or all-unnamespaced). A whitelist on any of
//! those slices wins over a blacklist on any other; with no rule at all the
//! tag is allowed.

use crate::error::{Result, TagError};
use crate::types::{Rule, Tag, TagSlice};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Slice -> rule map; a slice has at most one rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    rules: HashMap<TagSlice, Rule>,
}

impl TagFilter {
    /// An empty filter that allows everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from existing rules
    pub fn from_rules(rules: impl IntoIterator<Item = (TagSlice, Rule)>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Is `tag` permitted?
    #[must_use]
    pub fn tag_ok(&self, tag: &str) -> bool {
        let mut blacklist_encountered = false;

        for slice in TagSlice::slices_for(tag) {
            match self.rules.get(&slice) {
                Some(Rule::Whitelist) => return true,
                Some(Rule::Blacklist) => blacklist_encountered = true,
                None => {}
            }
        }

        !blacklist_encountered
    }

    /// Keep only the permitted tags
    #[must_use]
    pub fn filter<'a, I>(&self, tags: I) -> HashSet<Tag>
    where
        I: IntoIterator<Item = &'a Tag>,
    {
        tags.into_iter()
            .filter(|tag| self.tag_ok(tag))
            .cloned()
            .collect()
    }

    /// Set (or replace) the rule for a slice
    pub fn set_rule(&mut self, slice: TagSlice, rule: Rule) {
        self.rules.insert(slice, rule);
    }

    /// Drop any rule on a slice
    pub fn remove_rule(&mut self, slice: &TagSlice) -> Option<Rule> {
        self.rules.remove(slice)
    }

    /// Copy of the rule map
    #[must_use]
    pub fn rules(&self) -> HashMap<TagSlice, Rule> {
        self.rules.clone()
    }

    /// Rule on a given slice
    #[must_use]
    pub fn rule_for(&self, slice: &TagSlice) -> Option<Rule> {
        self.rules.get(slice).copied()
    }

    /// True iff no blacklist rule exists
    #[must_use]
    pub fn allows_everything(&self) -> bool {
        !self.rules.values().any(|rule| *rule == Rule::Blacklist)
    }

    // =========================================================================
    // Rule editing
    // =========================================================================

    /// Is `slice` already hidden by a blacklist on it or a broader slice?
    #[must_use]
    pub fn currently_blocked(&self, slice: &TagSlice) -> bool {
        let test_slices = match slice {
            TagSlice::AllNamespaced | TagSlice::AllUnnamespaced => vec![slice.clone()],
            TagSlice::Namespace(_) => vec![TagSlice::AllNamespaced, slice.clone()],
            TagSlice::Tag(tag) => TagSlice::slices_for(tag),
        };

        test_slices
            .iter()
            .any(|s| self.rules.get(s) == Some(&Rule::Blacklist))
    }

    /// Toggle a blacklist on `slice`.
    ///
    /// Fails with `RedundantRule` when a broader blacklist already hides it.
    pub fn add_blacklist(&mut self, slice: TagSlice) -> Result<()> {
        if self.rules.get(&slice) == Some(&Rule::Blacklist) {
            self.rules.remove(&slice);
            return Ok(());
        }

        if self.rules.get(&slice) == Some(&Rule::Whitelist) {
            self.rules.remove(&slice);
        }

        if self.currently_blocked(&slice) {
            return Err(TagError::RedundantRule {
                slice,
                reason: "already blocked by a broader rule".into(),
            });
        }

        debug!("Blacklisting {}", slice.describe());
        self.rules.insert(slice, Rule::Blacklist);
        Ok(())
    }

    /// Toggle a whitelist on `slice`.
    ///
    /// An existing blacklist on the slice itself is simply removed; the
    /// whitelist is only recorded if the slice is still blocked afterwards.
    pub fn add_whitelist(&mut self, slice: TagSlice) -> Result<()> {
        if self.rules.get(&slice) == Some(&Rule::Whitelist) {
            self.rules.remove(&slice);
            return Ok(());
        }

        self.rules.remove(&slice);

        if self.currently_blocked(&slice) {
            debug!("Whitelisting {}", slice.describe());
            self.rules.insert(slice, Rule::Whitelist);
            Ok(())
        } else if slice.is_global() {
            Ok(())
        } else {
            Err(TagError::RedundantRule {
                slice,
                reason: "already permitted by a broader rule".into(),
            })
        }
    }

    /// Hide all tags, keeping any exact/namespace whitelists.
    ///
    /// Narrower blacklists are dropped: the two global ones cover them.
    pub fn blacklist_everything(&mut self) {
        self.rules.retain(|slice, rule| *rule == Rule::Whitelist && !slice.is_global());
        for slice in [TagSlice::AllUnnamespaced, TagSlice::AllNamespaced] {
            self.rules.insert(slice, Rule::Blacklist);
        }
    }

    /// `(whitelist view possible, blacklist view possible)`
    ///
    /// A whitelist view only makes sense when the blacklist is limited to the
    /// global slices; a blacklist view only when nothing is whitelisted.
    #[must_use]
    pub fn white_blacklists_possible(&self) -> (bool, bool) {
        let (blacklist, whitelist) = self.split_rules();
        let whitelist_possible = blacklist.iter().all(TagSlice::is_global);
        (whitelist_possible, whitelist.is_empty())
    }

    // =========================================================================
    // Summaries
    // =========================================================================

    fn split_rules(&self) -> (Vec<TagSlice>, Vec<TagSlice>) {
        let mut blacklist = Vec::new();
        let mut whitelist = Vec::new();
        for (slice, rule) in &self.rules {
            match rule {
                Rule::Blacklist => blacklist.push(slice.clone()),
                Rule::Whitelist => whitelist.push(slice.clone()),
            }
        }
        blacklist.sort_by_key(ToString::to_string);
        whitelist.sort_by_key(ToString::to_string);
        (blacklist, whitelist)
    }

    fn blacklist_is(blacklist: &[TagSlice], expected: &[TagSlice]) -> bool {
        let got: HashSet<&TagSlice> = blacklist.iter().collect();
        let want: HashSet<&TagSlice> = expected.iter().collect();
        got == want
    }

    fn describe_all(slices: &[TagSlice]) -> String {
        slices
            .iter()
            .map(TagSlice::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// e.g. "blacklisting on 'character' tags except character:alice"
    #[must_use]
    pub fn to_blacklist_string(&self) -> String {
        let (blacklist, whitelist) = self.split_rules();

        if blacklist.is_empty() {
            return "no blacklist set".into();
        }

        let mut text = if Self::blacklist_is(&blacklist, &[TagSlice::AllUnnamespaced, TagSlice::AllNamespaced]) {
            "blacklisting on any tags".to_string()
        } else {
            format!("blacklisting on {}", Self::describe_all(&blacklist))
        };

        if !whitelist.is_empty() {
            text.push_str(&format!(" except {}", Self::describe_all(&whitelist)));
        }

        text
    }

    /// e.g. "all but 'character' tags allowed"
    #[must_use]
    pub fn to_censored_string(&self) -> String {
        let (blacklist, whitelist) = self.split_rules();

        if blacklist.is_empty() {
            return "all tags allowed".into();
        }

        let mut text = if Self::blacklist_is(&blacklist, &[TagSlice::AllUnnamespaced, TagSlice::AllNamespaced]) {
            "no tags allowed".to_string()
        } else {
            format!("all but {} allowed", Self::describe_all(&blacklist))
        };

        if !whitelist.is_empty() {
            text.push_str(&format!(" except {}", Self::describe_all(&whitelist)));
        }

        text
    }

    /// e.g. "only 'series' tags" or "all namespaced tags and blue_eyes"
    #[must_use]
    pub fn to_permitted_string(&self) -> String {
        let (blacklist, whitelist) = self.split_rules();

        if blacklist.is_empty() {
            return "all tags".into();
        }

        let with_extras = |mut text: String, joiner: &str| {
            if !whitelist.is_empty() {
                text.push_str(&format!("{joiner}{}", Self::describe_all(&whitelist)));
            }
            text
        };

        if Self::blacklist_is(&blacklist, &[TagSlice::AllUnnamespaced, TagSlice::AllNamespaced]) {
            if whitelist.is_empty() {
                "no tags".into()
            } else {
                format!("only {}", Self::describe_all(&whitelist))
            }
        } else if Self::blacklist_is(&blacklist, &[TagSlice::AllUnnamespaced]) {
            with_extras("all namespaced tags".into(), " and ")
        } else if Self::blacklist_is(&blacklist, &[TagSlice::AllNamespaced]) {
            with_extras("all unnamespaced tags".into(), " and ")
        } else {
            let mut text = format!("all tags except {}", Self::describe_all(&blacklist));
            if !whitelist.is_empty() {
                text.push_str(&format!(" (except {})", Self::describe_all(&whitelist)));
            }
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> HashSet<Tag> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let filter = TagFilter::new();
        assert!(filter.allows_everything());
        assert!(filter.tag_ok("character:alice"));
        assert!(filter.tag_ok("loose_tag"));
    }

    #[test]
    fn test_unnamespaced_whitelist_with_namespace_blacklist() {
        let filter = TagFilter::from_rules([
            (TagSlice::parse(""), Rule::Whitelist),
            (TagSlice::parse("character:"), Rule::Blacklist),
        ]);

        assert!(!filter.tag_ok("character:alice"));
        assert!(filter.tag_ok("loose_tag"));
        assert!(filter.tag_ok("series:wonderland"));
    }

    #[test]
    fn test_exact_whitelist_beats_global_blacklist() {
        let mut filter = TagFilter::new();
        filter.blacklist_everything();
        filter.set_rule(TagSlice::parse("character:alice"), Rule::Whitelist);

        assert!(filter.tag_ok("character:alice"));
        assert!(!filter.tag_ok("character:bob"));
        assert!(!filter.tag_ok("loose_tag"));
    }

    #[test]
    fn test_broad_whitelist_beats_exact_blacklist() {
        let filter = TagFilter::from_rules([
            (TagSlice::parse("character:alice"), Rule::Blacklist),
            (TagSlice::parse(":"), Rule::Whitelist),
        ]);

        assert!(filter.tag_ok("character:alice"));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = TagFilter::from_rules([(TagSlice::parse("meta:"), Rule::Blacklist)]);
        let input = tags(&["meta:tagme", "blue_eyes", "series:x"]);

        let once = filter.filter(&input);
        let twice = filter.filter(&once);

        assert_eq!(once, twice);
        assert_eq!(once, tags(&["blue_eyes", "series:x"]));
    }

    #[test]
    fn test_add_blacklist_redundant_under_namespace() {
        let mut filter = TagFilter::new();
        filter.add_blacklist(TagSlice::parse("character:")).unwrap();

        let err = filter.add_blacklist(TagSlice::parse("character:alice")).unwrap_err();
        assert!(matches!(err, TagError::RedundantRule { .. }));
        assert_eq!(filter.rules().len(), 1);
    }

    #[test]
    fn test_add_blacklist_toggles_off() {
        let mut filter = TagFilter::new();
        filter.add_blacklist(TagSlice::parse("meta:")).unwrap();
        filter.add_blacklist(TagSlice::parse("meta:")).unwrap();
        assert!(filter.rules().is_empty());
    }

    #[test]
    fn test_add_whitelist_only_when_blocked() {
        let mut filter = TagFilter::new();

        let err = filter.add_whitelist(TagSlice::parse("blue_eyes")).unwrap_err();
        assert!(matches!(err, TagError::RedundantRule { .. }));

        filter.add_blacklist(TagSlice::parse("")).unwrap();
        filter.add_whitelist(TagSlice::parse("blue_eyes")).unwrap();
        assert_eq!(filter.rule_for(&TagSlice::parse("blue_eyes")), Some(Rule::Whitelist));
    }

    #[test]
    fn test_add_whitelist_replaces_own_blacklist() {
        let mut filter = TagFilter::new();
        filter.add_blacklist(TagSlice::parse("series:")).unwrap();
        filter.add_whitelist(TagSlice::parse("series:")).unwrap();
        assert!(filter.rules().is_empty());
    }

    #[test]
    fn test_global_whitelist_is_never_redundant() {
        let mut filter = TagFilter::new();
        assert!(filter.add_whitelist(TagSlice::AllNamespaced).is_ok());
        assert!(filter.rules().is_empty());
    }

    #[test]
    fn test_white_blacklists_possible() {
        let mut filter = TagFilter::new();
        filter.blacklist_everything();
        filter.set_rule(TagSlice::parse("series:"), Rule::Whitelist);
        assert_eq!(filter.white_blacklists_possible(), (true, false));

        let filter = TagFilter::from_rules([(TagSlice::parse("meta:"), Rule::Blacklist)]);
        assert_eq!(filter.white_blacklists_possible(), (false, true));
    }

    #[test]
    fn test_blacklist_everything_replaces_narrow_blacklists() {
        let mut filter = TagFilter::from_rules([
            (TagSlice::parse("meta:"), Rule::Blacklist),
            (TagSlice::parse("blue_eyes"), Rule::Blacklist),
            (TagSlice::parse(":"), Rule::Whitelist),
            (TagSlice::parse("series:"), Rule::Whitelist),
        ]);
        filter.blacklist_everything();

        assert_eq!(filter.rules().len(), 3);
        assert_eq!(filter.rule_for(&TagSlice::parse("series:")), Some(Rule::Whitelist));
        assert_eq!(filter.to_permitted_string(), "only 'series' tags");
        assert_eq!(filter.white_blacklists_possible(), (true, false));

        let mut filter = TagFilter::from_rules([(TagSlice::parse("meta:"), Rule::Blacklist)]);
        filter.blacklist_everything();
        assert_eq!(filter.to_permitted_string(), "no tags");
        assert_eq!(filter.white_blacklists_possible(), (true, true));
    }

    #[test]
    fn test_permitted_string() {
        let mut filter = TagFilter::new();
        assert_eq!(filter.to_permitted_string(), "all tags");

        filter.blacklist_everything();
        assert_eq!(filter.to_permitted_string(), "no tags");

        filter.set_rule(TagSlice::parse("series:"), Rule::Whitelist);
        assert_eq!(filter.to_permitted_string(), "only 'series' tags");

        let filter = TagFilter::from_rules([
            (TagSlice::AllUnnamespaced, Rule::Blacklist),
            (TagSlice::parse("blue_eyes"), Rule::Whitelist),
        ]);
        assert_eq!(filter.to_permitted_string(), "all namespaced tags and blue_eyes");

        let filter = TagFilter::from_rules([
            (TagSlice::parse("meta:"), Rule::Blacklist),
            (TagSlice::parse("meta:favourite"), Rule::Whitelist),
        ]);
        assert_eq!(filter.to_permitted_string(), "all tags except 'meta' tags (except meta:favourite)");
    }

    #[test]
    fn test_blacklist_and_censored_strings() {
        let filter = TagFilter::from_rules([
            (TagSlice::parse("character:"), Rule::Blacklist),
            (TagSlice::parse("character:alice"), Rule::Whitelist),
        ]);

        assert_eq!(
            filter.to_blacklist_string(),
            "blacklisting on 'character' tags except character:alice"
        );
        assert_eq!(
            filter.to_censored_string(),
            "all but 'character' tags allowed except character:alice"
        );
        assert_eq!(TagFilter::new().to_censored_string(), "all tags allowed");
        assert_eq!(TagFilter::new().to_blacklist_string(), "no blacklist set");
    }
}
