// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Versioned persistence for filters and the display manager
//!
//! Objects are stored as `[name, version, info]`. Loading an old version runs
//! the object's upgrade steps one at a time over the stored JSON, each a pure
//! function from version N to N+1, and only then builds the live value.

use crate::display::TagDisplayManager;
use crate::error::{Result, TagError};
use crate::filter::TagFilter;
use crate::types::{DisplayContext, Rule, ServiceKey, TagSlice};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// One upgrade step over serialised info
pub type UpgradeFn = fn(Value) -> Result<Value>;

/// `[name, version, info]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialisableTuple(pub String, pub u32, pub Value);

impl SerialisableTuple {
    /// Object name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Stored version
    #[must_use]
    pub fn version(&self) -> u32 {
        self.1
    }
}

/// An object with a versioned, upgradeable stored form
pub trait Serialisable: Sized {
    /// Stored object name
    const NAME: &'static str;
    /// Version written today
    const VERSION: u32;

    /// `upgrades()[i]` takes version `i + 1` to `i + 2`
    fn upgrades() -> &'static [UpgradeFn];

    /// Current-version info
    fn to_info(&self) -> Result<Value>;

    /// Build from current-version info
    fn from_info(info: Value) -> Result<Self>;

    /// Wrap in a tuple at the current version
    fn to_tuple(&self) -> Result<SerialisableTuple> {
        Ok(SerialisableTuple(Self::NAME.to_string(), Self::VERSION, self.to_info()?))
    }

    /// Upgrade as needed, then build
    fn from_tuple(tuple: SerialisableTuple) -> Result<Self> {
        let SerialisableTuple(name, version, info) = tuple;
        if name != Self::NAME {
            return Err(malformed(Self::NAME, format!("expected {}, found {name}", Self::NAME)));
        }
        let info = upgrade(Self::NAME, version, info, Self::upgrades(), Self::VERSION)?;
        Self::from_info(info)
    }

    /// JSON text form
    fn dump_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_tuple()?)?)
    }

    /// Parse the JSON text form
    fn load_string(text: &str) -> Result<Self> {
        let tuple: SerialisableTuple = serde_json::from_str(text.trim())?;
        Self::from_tuple(tuple)
    }
}

fn malformed(name: &str, reason: impl Into<String>) -> TagError {
    TagError::MalformedSerialisable {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Step `info` from `version` up to `target`
pub fn upgrade(name: &str, mut version: u32, mut info: Value, steps: &[UpgradeFn], target: u32) -> Result<Value> {
    if version == 0 || version > target {
        return Err(TagError::UnknownSerialisableVersion {
            name: name.to_string(),
            version,
        });
    }

    while version < target {
        let step = usize::try_from(version - 1)
            .ok()
            .and_then(|index| steps.get(index))
            .ok_or_else(|| TagError::UnknownSerialisableVersion {
                name: name.to_string(),
                version,
            })?;
        info = step(info)?;
        version += 1;
        debug!("Upgraded {} to version {}", name, version);
    }

    Ok(info)
}

fn entries<'a>(name: &str, info: &'a Value) -> Result<&'a Vec<Value>> {
    info.as_array().ok_or_else(|| malformed(name, "expected a list"))
}

fn entry_pair<'a>(name: &str, entry: &'a Value) -> Result<(&'a Value, &'a Value)> {
    match entry.as_array().map(Vec::as_slice) {
        Some([first, second]) => Ok((first, second)),
        _ => Err(malformed(name, format!("expected a two-item entry, found {entry}"))),
    }
}

// =============================================================================
// Tag filter
// =============================================================================

const TAG_FILTER: &str = "tag_filter";

fn rule_name(rule: Rule) -> &'static str {
    match rule {
        Rule::Whitelist => "whitelist",
        Rule::Blacklist => "blacklist",
    }
}

/// v1 stored rules as 0 (whitelist) / 1 (blacklist)
fn tag_filter_v1_to_v2(info: Value) -> Result<Value> {
    let mut upgraded = Vec::new();
    for entry in entries(TAG_FILTER, &info)? {
        let (slice, code) = entry_pair(TAG_FILTER, entry)?;
        let rule = match code.as_u64() {
            Some(0) => Rule::Whitelist,
            Some(1) => Rule::Blacklist,
            _ => return Err(malformed(TAG_FILTER, format!("unknown rule code {code}"))),
        };
        upgraded.push(json!([slice, rule_name(rule)]));
    }
    Ok(Value::Array(upgraded))
}

const TAG_FILTER_UPGRADES: &[UpgradeFn] = &[tag_filter_v1_to_v2];

impl Serialisable for TagFilter {
    const NAME: &'static str = TAG_FILTER;
    const VERSION: u32 = 2;

    fn upgrades() -> &'static [UpgradeFn] {
        TAG_FILTER_UPGRADES
    }

    fn to_info(&self) -> Result<Value> {
        let mut rules: Vec<(String, Rule)> = self
            .rules()
            .into_iter()
            .map(|(slice, rule)| (slice.to_string(), rule))
            .collect();
        rules.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Value::Array(
            rules
                .into_iter()
                .map(|(slice, rule)| json!([slice, rule_name(rule)]))
                .collect(),
        ))
    }

    fn from_info(info: Value) -> Result<Self> {
        let mut rules = Vec::new();
        for entry in entries(TAG_FILTER, &info)? {
            let (slice, rule) = entry_pair(TAG_FILTER, entry)?;
            let slice = slice
                .as_str()
                .ok_or_else(|| malformed(TAG_FILTER, format!("slice is not text: {slice}")))?;
            let rule = match rule.as_str() {
                Some("whitelist") => Rule::Whitelist,
                Some("blacklist") => Rule::Blacklist,
                _ => return Err(malformed(TAG_FILTER, format!("unknown rule {rule}"))),
            };
            rules.push((TagSlice::parse(slice), rule));
        }
        Ok(TagFilter::from_rules(rules))
    }
}

// =============================================================================
// Display manager
// =============================================================================

const TAG_DISPLAY_MANAGER: &str = "tag_display_manager";

/// v1 keyed contexts by numeric code
fn display_manager_v1_to_v2(info: Value) -> Result<Value> {
    let mut upgraded = Vec::new();
    for entry in entries(TAG_DISPLAY_MANAGER, &info)? {
        let (code, filters) = entry_pair(TAG_DISPLAY_MANAGER, entry)?;
        let context = code
            .as_u64()
            .and_then(DisplayContext::from_code)
            .ok_or_else(|| malformed(TAG_DISPLAY_MANAGER, format!("unknown display context {code}")))?;
        upgraded.push(json!([context.name(), filters]));
    }
    Ok(Value::Array(upgraded))
}

const DISPLAY_MANAGER_UPGRADES: &[UpgradeFn] = &[display_manager_v1_to_v2];

impl Serialisable for TagDisplayManager {
    const NAME: &'static str = TAG_DISPLAY_MANAGER;
    const VERSION: u32 = 2;

    fn upgrades() -> &'static [UpgradeFn] {
        DISPLAY_MANAGER_UPGRADES
    }

    fn to_info(&self) -> Result<Value> {
        let mut contexts: Vec<_> = self.snapshot().into_iter().collect();
        contexts.sort_by_key(|(context, _)| *context);

        let mut info = Vec::new();
        for (context, filters) in contexts {
            let mut filters: Vec<_> = filters.into_iter().collect();
            filters.sort_by(|a, b| a.0.cmp(&b.0));

            let mut stored = Vec::new();
            for (service, filter) in filters {
                let tuple = filter.to_tuple()?;
                stored.push(json!([service.as_hex(), tuple]));
            }
            info.push(json!([context.name(), stored]));
        }
        Ok(Value::Array(info))
    }

    fn from_info(info: Value) -> Result<Self> {
        let mut filters: HashMap<DisplayContext, HashMap<ServiceKey, TagFilter>> = HashMap::new();
        for entry in entries(TAG_DISPLAY_MANAGER, &info)? {
            let (name, stored) = entry_pair(TAG_DISPLAY_MANAGER, entry)?;
            let context = name
                .as_str()
                .and_then(DisplayContext::from_name)
                .ok_or_else(|| malformed(TAG_DISPLAY_MANAGER, format!("unknown display context {name}")))?;

            let service_filters = filters.entry(context).or_default();
            for service_entry in entries(TAG_DISPLAY_MANAGER, stored)? {
                let (hex_key, tuple) = entry_pair(TAG_DISPLAY_MANAGER, service_entry)?;
                let hex_key = hex_key
                    .as_str()
                    .ok_or_else(|| malformed(TAG_DISPLAY_MANAGER, format!("service key is not text: {hex_key}")))?;
                let tuple: SerialisableTuple = serde_json::from_value(tuple.clone())?;
                service_filters.insert(ServiceKey::from_hex(hex_key), TagFilter::from_tuple(tuple)?);
            }
        }
        Ok(TagDisplayManager::from_filters(filters))
    }
}
