// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-context, per-service display filtering
//!
//! Each display context is an independent namespace of service -> filter.
//! A service's own filter runs first, then the combined pseudo-service's
//! filter; a tag must pass both.

use crate::filter::TagFilter;
use crate::types::{DisplayContext, Rule, ServiceKey, Tag, TagSlice};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

type ServiceFilters = HashMap<ServiceKey, TagFilter>;

#[derive(Debug, Default)]
struct Inner {
    filters: HashMap<DisplayContext, ServiceFilters>,
    dirty: bool,
}

/// Display filters for every (context, service) pair, behind one mutex
#[derive(Debug, Default)]
pub struct TagDisplayManager {
    inner: Mutex<Inner>,
}

impl TagDisplayManager {
    /// A manager with no filters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a manager from stored filters; starts clean
    #[must_use]
    pub fn from_filters(filters: HashMap<DisplayContext, HashMap<ServiceKey, TagFilter>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                filters,
                dirty: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the service filter, then the combined filter
    #[must_use]
    pub fn filter_tags(&self, context: DisplayContext, service: &ServiceKey, tags: &HashSet<Tag>) -> HashSet<Tag> {
        let inner = self.lock();
        let Some(service_filters) = inner.filters.get(&context) else {
            return tags.clone();
        };

        let mut tags = match service_filters.get(service) {
            Some(filter) => filter.filter(tags),
            None => tags.clone(),
        };

        if !service.is_combined() {
            if let Some(combined) = service_filters.get(&ServiceKey::combined()) {
                tags = combined.filter(&tags);
            }
        }

        tags
    }

    /// Would any filter run for this (context, service)?
    #[must_use]
    pub fn filters_tags(&self, context: DisplayContext, service: &ServiceKey) -> bool {
        let inner = self.lock();
        inner.filters.get(&context).is_some_and(|service_filters| {
            service_filters.contains_key(service)
                || (!service.is_combined() && service_filters.contains_key(&ServiceKey::combined()))
        })
    }

    /// Is a single tag shown?
    #[must_use]
    pub fn tag_ok(&self, context: DisplayContext, service: &ServiceKey, tag: &str) -> bool {
        let single: HashSet<Tag> = std::iter::once(tag.to_string()).collect();
        !self.filter_tags(context, service, &single).is_empty()
    }

    /// Copy of the registered filter, or an empty one
    #[must_use]
    pub fn tag_filter(&self, context: DisplayContext, service: &ServiceKey) -> TagFilter {
        let inner = self.lock();
        inner
            .filters
            .get(&context)
            .and_then(|service_filters| service_filters.get(service))
            .cloned()
            .unwrap_or_default()
    }

    /// Register a filter; one that allows everything removes the entry instead
    pub fn set_tag_filter(&self, context: DisplayContext, service: &ServiceKey, filter: TagFilter) {
        let mut inner = self.lock();

        if filter.allows_everything() {
            let removed = inner
                .filters
                .get_mut(&context)
                .and_then(|service_filters| service_filters.remove(service))
                .is_some();
            if removed {
                debug!("Removed {:?} filter for {}", context, service);
                inner.dirty = true;
            }
        } else {
            debug!("Set {:?} filter for {}: {}", context, service, filter.to_permitted_string());
            inner
                .filters
                .entry(context)
                .or_default()
                .insert(service.clone(), filter);
            inner.dirty = true;
        }
    }

    /// Blacklist one exact tag for this (context, service)
    pub fn hide_tag(&self, context: DisplayContext, service: &ServiceKey, tag: &str) {
        let mut inner = self.lock();
        inner
            .filters
            .entry(context)
            .or_default()
            .entry(service.clone())
            .or_default()
            .set_rule(TagSlice::Tag(tag.to_string()), Rule::Blacklist);
        inner.dirty = true;
    }

    /// Snapshot of every registered filter, for persistence
    #[must_use]
    pub fn snapshot(&self) -> HashMap<DisplayContext, HashMap<ServiceKey, TagFilter>> {
        self.lock().filters.clone()
    }

    /// Has anything changed since the last flush?
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Mark as needing a flush
    pub fn set_dirty(&self) {
        self.lock().dirty = true;
    }

    /// Mark as flushed
    pub fn set_clean(&self) {
        self.lock().dirty = false;
    }
}
