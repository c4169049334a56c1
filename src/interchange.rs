// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Newline text import/export for tag slices and relationship pairs

use crate::error::{Result, TagError};
use crate::filter::TagFilter;
use crate::serialise::Serialisable;
use crate::types::{Pair, Rule, Tag, TagSlice};
use tracing::debug;

/// Trimmed non-blank lines
fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// One tag slice per line
#[must_use]
pub fn parse_slices(text: &str) -> Vec<TagSlice> {
    lines(text).map(TagSlice::parse).collect()
}

/// Read a filter from either a stored blob or a plain slice list.
///
/// Plain lists become a filter with `rule` on every slice.
pub fn import_filter(text: &str, rule: Rule) -> Result<TagFilter> {
    if text.trim_start().starts_with('[') {
        return TagFilter::load_string(text);
    }

    let slices = parse_slices(text);
    debug!("Imported {} slice(s) as {:?}", slices.len(), rule);
    Ok(TagFilter::from_rules(slices.into_iter().map(|slice| (slice, rule))))
}

/// The slices carrying `rule`, one per line, sorted
#[must_use]
pub fn export_slices(filter: &TagFilter, rule: Rule) -> String {
    let mut slices: Vec<String> = filter
        .rules()
        .into_iter()
        .filter(|(_, r)| *r == rule)
        .map(|(slice, _)| slice.to_string())
        .collect();
    slices.sort();
    slices.join("\n")
}

/// Tags alternating left/right, one per line
pub fn parse_pairs(text: &str) -> Result<Vec<Pair>> {
    let tags: Vec<Tag> = lines(text).map(str::to_string).collect();
    if tags.len() % 2 == 1 {
        return Err(TagError::UnevenPairImport { count: tags.len() });
    }

    Ok(tags
        .chunks_exact(2)
        .map(|chunk| Pair::new(chunk[0].clone(), chunk[1].clone()))
        .collect())
}

/// Inverse of [`parse_pairs`]
pub fn export_pairs<'a>(pairs: impl IntoIterator<Item = &'a Pair>) -> String {
    pairs
        .into_iter()
        .flat_map(|pair| [pair.left(), pair.right()])
        .collect::<Vec<_>>()
        .join("\n")
}
