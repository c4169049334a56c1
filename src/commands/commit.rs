// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Commit and cancel commands - close open edit sessions

use super::{write_output, Context};
use crate::types::{ContentType, ContentUpdate, ServiceKey};
use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing::info;

/// Run commit command
pub fn run(ctx: &Context, output: Option<PathBuf>) -> Result<()> {
    let repo = ctx.repository()?;
    let sessions = repo.sessions()?;

    if sessions.is_empty() {
        println!("Nothing to commit");
        return Ok(());
    }

    let mut all_updates: Vec<ContentUpdate> = Vec::new();
    for session in sessions {
        let service = repo
            .find_service(session.service.as_hex())
            .with_context(|| format!("Session for unknown service {}", session.service))?
            .clone();

        let updates = repo.commit_session(&service, &session)?;
        info!("Committed {} {} update(s) to {}", updates.len(), session.content_type, service.name);
        if !ctx.json {
            println!("{}: {} {} update(s)", service.name, updates.len(), session.content_type);
            for update in &updates {
                if let Some(pair) = update.as_pair() {
                    match &update.reason {
                        Some(reason) => println!("  {} {} ({})", update.action, pair, reason),
                        None => println!("  {} {}", update.action, pair),
                    }
                }
            }
        }
        all_updates.extend(updates);
    }

    if output.is_some() || ctx.json {
        let json = serde_json::to_string_pretty(&all_updates).context("Failed to serialize updates")?;
        write_output(output.as_deref(), &json)?;
    }

    Ok(())
}

/// Run cancel command
pub fn cancel(ctx: &Context, service: Option<String>, content_type: Option<String>) -> Result<()> {
    let repo = ctx.repository()?;

    let keys: Vec<ServiceKey> = match service {
        Some(name) => vec![repo.find_service(&name)?.key.clone()],
        None => repo.services().iter().map(|s| s.key.clone()).collect(),
    };

    let content_types = match content_type.as_deref() {
        None => vec![ContentType::TagSiblings, ContentType::TagParents],
        Some("siblings" | "sibling") => vec![ContentType::TagSiblings],
        Some("parents" | "parent") => vec![ContentType::TagParents],
        Some(other) => anyhow::bail!("Unknown content type: {}. Valid: siblings, parents", other),
    };

    let mut discarded = 0;
    for key in &keys {
        for content_type in &content_types {
            if repo.discard_session(key, *content_type)? {
                discarded += 1;
            }
        }
    }

    println!("Discarded {} session(s)", discarded);
    Ok(())
}
