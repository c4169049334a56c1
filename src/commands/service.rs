// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Service management commands - register local services and tag repositories

use super::Context;
use crate::types::{ContentType, PermissionAction, Service, ServiceKind};
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Run service command
pub fn run(
    ctx: &Context,
    action: &str,
    name: Option<String>,
    repository: bool,
    can_petition: bool,
    can_overrule: bool,
    tags: Vec<String>,
) -> Result<()> {
    let mut repo = ctx.repository()?;

    match action {
        "add" | "create" => {
            let name = name.ok_or_else(|| anyhow::anyhow!("Service name is required"))?;

            let service = if repository {
                let mut grants = BTreeSet::new();
                if can_petition {
                    grants.insert(PermissionAction::Petition);
                }
                if can_overrule {
                    grants.insert(PermissionAction::Overrule);
                }
                let permissions = BTreeMap::from([
                    (ContentType::TagSiblings, grants.clone()),
                    (ContentType::TagParents, grants),
                ]);
                Service::repository(&name, permissions)
            } else {
                Service::local(&name)
            };

            let key = service.key.clone();
            repo.add_service(service)?;
            repo.save_registry()?;

            println!("Added service: {}", name);
            println!("  key: {}", key);
        }

        "remove" | "delete" | "rm" => {
            let name = name.ok_or_else(|| anyhow::anyhow!("Service name is required"))?;
            let key = repo.find_service(&name)?.key.clone();

            if repo.remove_service(&key)? {
                repo.save_registry()?;
                println!("Removed service: {}", name);
            }
        }

        "list" | "ls" => {
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(repo.services())?);
                return Ok(());
            }

            println!("Services ({}):", repo.services().len());
            for service in repo.services() {
                let kind = match service.kind {
                    ServiceKind::Local => "local".to_string(),
                    ServiceKind::Repository => {
                        let grants: Vec<String> = service
                            .permissions
                            .get(&ContentType::TagSiblings)
                            .map(|actions| actions.iter().map(|a| format!("{a:?}").to_lowercase()).collect())
                            .unwrap_or_default();
                        if grants.is_empty() {
                            "repository, read-only".to_string()
                        } else {
                            format!("repository, can {}", grants.join("/"))
                        }
                    }
                };
                println!("  {} ({}) {}", service.name, kind, service.key);
            }
        }

        "tags" | "known" => {
            let name = name.ok_or_else(|| anyhow::anyhow!("Service name is required"))?;
            let key = repo.find_service(&name)?.key.clone();

            let mut data = repo.load_data(&key)?;
            let before = data.known_tags.len();
            data.known_tags.extend(tags);
            repo.save_data(&key, &data)?;

            println!(
                "{} now knows {} tag(s) ({} new)",
                name,
                data.known_tags.len(),
                data.known_tags.len() - before
            );
        }

        _ => {
            anyhow::bail!("Unknown action: {}. Valid: add, remove, list, tags", action);
        }
    }

    Ok(())
}
