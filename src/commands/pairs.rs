// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Sibling and parent commands - edit a service's relationship pairs
//!
//! Edits accumulate in a persisted session until `tagsync commit`.

use super::{read_input, write_output, Context};
use crate::interchange::{export_pairs, parse_pairs};
use crate::resolver::{AddMode, AutoDecider, ConflictResolver, PairOutcome};
use crate::types::{ContentType, Pair, Tag};
use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;

/// Options shared by every pair action
#[derive(Debug, Clone, Default)]
pub struct PairArgs {
    /// Service name or key
    pub service: String,
    /// Reason for pends and petitions
    pub reason: Option<String>,
    /// Confirm rescinds without asking
    pub yes: bool,
    /// Import: only add, never remove
    pub add_only: bool,
    /// List: include current pairs
    pub all: bool,
    /// Import/export file (stdin/stdout otherwise)
    pub file: Option<PathBuf>,
}

fn noun(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::TagSiblings => "sibling",
        _ => "parent",
    }
}

fn pairs_from_args(tags: &[Tag]) -> Result<Vec<Pair>> {
    if tags.is_empty() || tags.len() % 2 == 1 {
        anyhow::bail!("Expected tags in pairs, got {}", tags.len());
    }
    Ok(tags
        .chunks_exact(2)
        .map(|chunk| Pair::new(chunk[0].clone(), chunk[1].clone()))
        .collect())
}

fn print_outcome(ctx: &Context, outcome: &PairOutcome) {
    let lines = [
        ("Pended", &outcome.pended),
        ("Petitioned", &outcome.petitioned),
        ("Rescinded pend", &outcome.rescinded_pends),
        ("Rescinded petition", &outcome.rescinded_petitions),
    ];
    for (label, pairs) in lines {
        for pair in pairs {
            println!("{}: {}", label, pair);
        }
    }
    for (pair, err) in &outcome.rejected {
        eprintln!("{}", ctx.warning(&format!("Rejected {}: {}", pair, err)));
    }
}

fn report(ctx: &Context, outcome: &PairOutcome) -> Result<()> {
    print_outcome(ctx, outcome);

    if !outcome.changed() {
        if let Some((_, err)) = outcome.rejected.first() {
            anyhow::bail!("{}", err);
        }
        println!("Nothing changed (a repository needs --reason; rescinds via import need --yes)");
    }
    Ok(())
}

/// Run sibling/parent command
pub fn run(ctx: &Context, content_type: ContentType, action: &str, tags: Vec<Tag>, args: &PairArgs) -> Result<()> {
    let repo = ctx.repository()?;
    let service = repo.find_service(&args.service)?.clone();
    let mut session = repo.open_session(&service.key, content_type)?;

    match action {
        "add" | "remove" | "rm" | "toggle" | "import" => {
            let (pairs, mode) = match action {
                "add" => (pairs_from_args(&tags)?, AddMode::AddOnly),
                "remove" | "rm" => (pairs_from_args(&tags)?, AddMode::RemoveOnly),
                "toggle" => (pairs_from_args(&tags)?, AddMode::Toggle),
                _ => {
                    let text = read_input(args.file.as_deref())?;
                    let mode = if args.add_only { AddMode::AddOnly } else { AddMode::Toggle };
                    (parse_pairs(&text)?, mode)
                }
            };

            let mut decider = AutoDecider {
                reason: args.reason.clone(),
                confirm: args.yes || matches!(action, "add" | "remove" | "rm"),
            };

            let mut resolver = ConflictResolver::new(&service, &mut session)?
                .with_reasons(&ctx.config.auto_petition_reason, &ctx.config.overrule_reason);

            if content_type == ContentType::TagSiblings && action == "add" {
                let outcome = resolver.auto_petition_conflicts(&pairs, &mut decider);
                print_outcome(ctx, &outcome);
            }

            let outcome = resolver.add_pairs(pairs, mode, None, &mut decider);
            repo.save_session(&session)?;
            report(ctx, &outcome)?;
        }

        "list" | "ls" => {
            let pertinent: HashSet<Tag> = tags.into_iter().collect();
            let listed = session.list_pairs(&pertinent, args.all, &HashSet::new());

            if ctx.json {
                let rows: Vec<_> = listed
                    .iter()
                    .map(|l| serde_json::json!({ "pair": l.pair, "status": l.status, "note": l.note }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            if listed.is_empty() {
                println!("No {} pairs to show for {}", noun(content_type), service.name);
            }
            for row in listed {
                let mut line = format!("{}{} -> {}", ctx.status_prefix(row.status), row.pair.left(), row.pair.right());
                if let Some(note) = row.note {
                    line.push_str(&format!("  {note}"));
                }
                println!("{line}");
            }
        }

        "export" => {
            let pairs: Vec<&Pair> = session.current().effective_pairs().collect();
            write_output(args.file.as_deref(), &export_pairs(pairs))?;
        }

        _ => {
            anyhow::bail!(
                "Unknown action: {}. Valid: add, remove, toggle, list, import, export",
                action
            );
        }
    }

    Ok(())
}
