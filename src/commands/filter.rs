// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Filter commands - edit the display filters of a (context, service)

use super::{read_input, write_output, Context};
use crate::error::TagError;
use crate::interchange::{export_slices, import_filter};
use crate::serialise::Serialisable;
use crate::types::{DisplayContext, Rule, ServiceKey, TagSlice};
use anyhow::Result;
use std::path::PathBuf;

/// Options shared by every filter action
#[derive(Debug, Clone, Default)]
pub struct FilterArgs {
    /// Service name or key; `None` means every service combined
    pub service: Option<String>,
    /// Display context name
    pub context: String,
    /// Import/export rule: whitelist or blacklist
    pub rule: Option<String>,
    /// Export as a stored blob instead of plain slices
    pub blob: bool,
    /// Import/export file (stdin/stdout otherwise)
    pub file: Option<PathBuf>,
}

fn parse_rule(rule: Option<&str>) -> Result<Rule> {
    match rule.unwrap_or("blacklist") {
        "blacklist" => Ok(Rule::Blacklist),
        "whitelist" => Ok(Rule::Whitelist),
        other => anyhow::bail!("Unknown rule: {}. Valid: blacklist, whitelist", other),
    }
}

/// Run filter command
pub fn run(ctx: &Context, action: &str, items: Vec<String>, args: &FilterArgs) -> Result<()> {
    let context = DisplayContext::from_name(&args.context).ok_or_else(|| {
        let valid: Vec<&str> = DisplayContext::ALL.iter().map(|c| c.name()).collect();
        anyhow::anyhow!("Unknown display context: {}. Valid: {}", args.context, valid.join(", "))
    })?;

    let repo = ctx.repository()?;
    let service = match args.service.as_deref() {
        None | Some("all") => ServiceKey::combined(),
        Some(name) => repo.find_service(name)?.key.clone(),
    };

    let display = repo.load_display()?;
    let mut filter = display.tag_filter(context, &service);

    match action {
        "show" => {
            println!("{} filter for {}:", context, service);
            println!("  {}", filter.to_permitted_string());
            println!("  censored: {}", filter.to_censored_string());
            let (whitelist_possible, blacklist_possible) = filter.white_blacklists_possible();
            if !whitelist_possible && !blacklist_possible {
                println!("  (mixed rules, only editable as a rule list)");
            }
            return Ok(());
        }

        "test" => {
            for tag in &items {
                let verdict = if display.tag_ok(context, &service, tag) { "shown" } else { "hidden" };
                println!("{tag}: {verdict}");
            }
            return Ok(());
        }

        "whitelist" | "blacklist" => {
            if items.is_empty() {
                anyhow::bail!("At least one tag slice is required");
            }
            for item in &items {
                let slice = TagSlice::parse(item);
                let result = if action == "whitelist" {
                    filter.add_whitelist(slice)
                } else {
                    filter.add_blacklist(slice)
                };
                match result {
                    Ok(()) => {}
                    Err(err @ TagError::RedundantRule { .. }) => eprintln!("{}", ctx.warning(&err.to_string())),
                    Err(err) => return Err(err.into()),
                }
            }
        }

        "blacklist-all" => filter.blacklist_everything(),

        "remove" | "rm" => {
            for item in &items {
                if filter.remove_rule(&TagSlice::parse(item)).is_none() {
                    eprintln!("{}", ctx.warning(&format!("No rule for {}", TagSlice::parse(item).describe())));
                }
            }
        }

        "import" => {
            let text = read_input(args.file.as_deref())?;
            filter = import_filter(&text, parse_rule(args.rule.as_deref())?)?;
        }

        "export" => {
            let text = if args.blob {
                filter.dump_string()?
            } else {
                export_slices(&filter, parse_rule(args.rule.as_deref())?)
            };
            write_output(args.file.as_deref(), &text)?;
            return Ok(());
        }

        _ => {
            anyhow::bail!(
                "Unknown action: {}. Valid: show, test, whitelist, blacklist, blacklist-all, remove, import, export",
                action
            );
        }
    }

    println!("{}", filter.to_permitted_string());
    display.set_tag_filter(context, &service, filter);
    repo.save_display(&display)?;

    Ok(())
}
