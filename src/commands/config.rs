// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

use super::Context;
use crate::config::{self, KEYS};
use anyhow::Result;

/// Run config command
pub fn run(ctx: &Context, key: &str, value: Option<String>) -> Result<()> {
    match value {
        Some(v) => {
            let path = ctx
                .config_path
                .clone()
                .or_else(config::default_config_path)
                .ok_or_else(|| anyhow::anyhow!("No config directory available; pass --config"))?;
            tracing::info!("Setting {} = {}", key, v);
            config::set(&path, key, &v)?;
            println!("{} = {} ({})", key, v, path.display());
        }
        None => {
            let current = ctx
                .config
                .get(key)
                .ok_or_else(|| anyhow::anyhow!("Unknown config key: {}. Valid: {}", key, KEYS.join(", ")))?;
            println!("{current}");
        }
    }
    Ok(())
}
