// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Resolve command - show the tags a set of stored tags displays as

use super::Context;
use crate::manager::{TagParentsManager, TagSiblingsManager};
use crate::types::{ContentType, DisplayContext, Tag};
use anyhow::Result;
use std::collections::HashSet;
use tracing::debug;

/// Run resolve command
pub fn run(
    ctx: &Context,
    tags: Vec<Tag>,
    service: &str,
    context: &str,
    strict: bool,
    preview: bool,
) -> Result<()> {
    let context = DisplayContext::from_name(context).ok_or_else(|| {
        let valid: Vec<&str> = DisplayContext::ALL.iter().map(|c| c.name()).collect();
        anyhow::anyhow!("Unknown display context: {}. Valid: {}", context, valid.join(", "))
    })?;

    let repo = ctx.repository()?;
    let service = repo.find_service(service)?.clone();

    let siblings = TagSiblingsManager::new(ctx.config.max_chain_length);
    let parents = TagParentsManager::new();
    repo.load_managers(&siblings, &parents)?;

    if preview {
        let data = repo.load_data(&service.key)?;
        let known_tags: Option<HashSet<Tag>> =
            (!data.known_tags.is_empty()).then(|| data.known_tags.iter().cloned().collect());

        let session = repo.open_session(&service.key, ContentType::TagSiblings)?;
        siblings.set_service(&service.key, session.current().effective_pairs(), known_tags.clone());
        let session = repo.open_session(&service.key, ContentType::TagParents)?;
        parents.set_service(&service.key, session.current().effective_pairs(), known_tags);
    }

    let input: HashSet<Tag> = tags.into_iter().collect();
    let collapsed = siblings.collapse_tags(&service.key, &input, strict)?;
    let expanded = parents.expand_tags(&service.key, &collapsed, strict);
    debug!("{} tag(s) -> {} collapsed -> {} expanded", input.len(), collapsed.len(), expanded.len());

    let display = repo.load_display()?;
    let shown = display.filter_tags(context, &service.key, &expanded);

    let mut shown: Vec<Tag> = shown.into_iter().collect();
    shown.sort();

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        for tag in &shown {
            println!("{tag}");
        }
    }

    Ok(())
}
