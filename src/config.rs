// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Layers, lowest first: built-in defaults, `config.toml`, `TAGSYNC_*`
//! environment variables.

use crate::graph::DEFAULT_MAX_CHAIN;
use crate::resolver::{DEFAULT_AUTO_PETITION_REASON, DEFAULT_OVERRULE_REASON};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys accepted by `tagsync config`
pub const KEYS: [&str; 5] = [
    "data_dir",
    "log_level",
    "max_chain_length",
    "auto_petition_reason",
    "overrule_reason",
];

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for persistent data (services, relationships, sessions)
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub log_level: String,
    /// Longest sibling chain walked before the data is declared broken
    pub max_chain_length: usize,
    /// Prefix of the reason on automatic conflict petitions
    pub auto_petition_reason: String,
    /// Reason used when the account can overrule review
    pub overrule_reason: String,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "hyperpolymath", "tagsync")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("~/.local/share/tagsync")),
            log_level: "info".to_string(),
            max_chain_length: DEFAULT_MAX_CHAIN,
            auto_petition_reason: DEFAULT_AUTO_PETITION_REASON.to_string(),
            overrule_reason: DEFAULT_OVERRULE_REASON.to_string(),
        }
    }
}

impl Config {
    /// Effective value of a key, as text
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "data_dir" => Some(self.data_dir.display().to_string()),
            "log_level" => Some(self.log_level.clone()),
            "max_chain_length" => Some(self.max_chain_length.to_string()),
            "auto_petition_reason" => Some(self.auto_petition_reason.clone()),
            "overrule_reason" => Some(self.overrule_reason.clone()),
            _ => None,
        }
    }
}

/// `config.toml` in the platform config directory
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from defaults, the config file and the environment
pub fn load(config_path: Option<&Path>) -> Result<Config> {
    let defaults = Config::default();
    let path = config_path.map(Path::to_path_buf).or_else(default_config_path);

    let mut builder = ::config::Config::builder()
        .set_default("data_dir", defaults.data_dir.display().to_string())?
        .set_default("log_level", defaults.log_level)?
        .set_default("max_chain_length", u64::try_from(defaults.max_chain_length).unwrap_or(u64::MAX))?
        .set_default("auto_petition_reason", defaults.auto_petition_reason)?
        .set_default("overrule_reason", defaults.overrule_reason)?;

    if let Some(path) = &path {
        builder = builder.add_source(
            ::config::File::from(path.as_path())
                .format(::config::FileFormat::Toml)
                .required(false),
        );
    }

    let settings = builder
        .add_source(::config::Environment::with_prefix("TAGSYNC").try_parsing(true))
        .build()
        .context("Failed to build configuration")?;

    settings
        .try_deserialize()
        .context("Failed to parse configuration")
}

/// Write one key into a config file, keeping the others
pub fn set(path: &Path, key: &str, value: &str) -> Result<()> {
    if !KEYS.contains(&key) {
        anyhow::bail!("Unknown config key: {}. Valid: {}", key, KEYS.join(", "));
    }

    let mut table: toml::Table = if path.exists() {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        content
            .parse()
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        toml::Table::new()
    };

    let value = if key == "max_chain_length" {
        let limit: i64 = value
            .parse()
            .with_context(|| format!("max_chain_length must be a positive integer, got {value}"))?;
        if limit <= 0 {
            anyhow::bail!("max_chain_length must be a positive integer, got {}", value);
        }
        toml::Value::Integer(limit)
    } else {
        toml::Value::String(value.to_string())
    };
    table.insert(key.to_string(), value);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(&table).context("Failed to serialize configuration")?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
