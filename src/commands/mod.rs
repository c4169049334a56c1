// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod commit;
pub mod completions;
pub mod config;
pub mod filter;
pub mod pairs;
pub mod resolve;
pub mod service;

use crate::config::Config;
use crate::repository::Repository;
use crate::types::RelationshipStatus;
use anyhow::{Context as _, Result};
use owo_colors::OwoColorize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// What every command gets from the command line and configuration
#[derive(Debug, Clone)]
pub struct Context {
    /// Effective configuration
    pub config: Config,
    /// Config file in use, if any
    pub config_path: Option<PathBuf>,
    /// Colored output
    pub color: bool,
    /// JSON output
    pub json: bool,
}

impl Context {
    /// Open the data directory
    pub fn repository(&self) -> Result<Repository> {
        Repository::open(&self.config.data_dir)
            .with_context(|| format!("Failed to open data directory {}", self.config.data_dir.display()))
    }

    /// Status prefix, colored when enabled
    #[must_use]
    pub fn status_prefix(&self, status: RelationshipStatus) -> String {
        let prefix = status.prefix();
        if !self.color {
            return prefix.to_string();
        }
        match status {
            RelationshipStatus::Current => prefix.to_string(),
            RelationshipStatus::Pending => prefix.green().to_string(),
            RelationshipStatus::Petitioned => prefix.red().to_string(),
        }
    }

    /// A warning line for stderr
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        if self.color {
            message.yellow().to_string()
        } else {
            message.to_string()
        }
    }
}

/// Read text from a file, or stdin when no path is given
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Write text to a file, or stdout when no path is given
pub fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
