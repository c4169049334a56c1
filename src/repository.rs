// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! On-disk data directory: service registry, authoritative relationship
//! snapshots, open edit sessions and display filters
//!
//! Layout:
//!
//! ```text
//! <data_dir>/services.json
//! <data_dir>/relationships/<service>.json
//! <data_dir>/sessions/<service>-<siblings|parents>.json
//! <data_dir>/display.json
//! ```

use crate::display::TagDisplayManager;
use crate::error::TagError;
use crate::manager::{TagParentsManager, TagSiblingsManager};
use crate::serialise::Serialisable;
use crate::status::{EditSession, StatusStore};
use crate::types::{ContentType, ContentUpdate, Service, ServiceKey, Tag};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the local service every data directory starts with
pub const DEFAULT_LOCAL_SERVICE: &str = "my tags";

/// Everything stored for one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceData {
    /// Sibling statuses
    #[serde(default)]
    pub siblings: StatusStore,
    /// Parent statuses
    #[serde(default)]
    pub parents: StatusStore,
    /// Tags the service holds mappings for, used by strict resolution
    #[serde(default)]
    pub known_tags: BTreeSet<Tag>,
}

impl ServiceData {
    /// Store for a relationship content type
    #[must_use]
    pub fn store(&self, content_type: ContentType) -> Option<&StatusStore> {
        match content_type {
            ContentType::TagSiblings => Some(&self.siblings),
            ContentType::TagParents => Some(&self.parents),
            ContentType::Mappings => None,
        }
    }

    /// Mutable store for a relationship content type
    pub fn store_mut(&mut self, content_type: ContentType) -> Option<&mut StatusStore> {
        match content_type {
            ContentType::TagSiblings => Some(&mut self.siblings),
            ContentType::TagParents => Some(&mut self.parents),
            ContentType::Mappings => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServiceRegistry {
    services: Vec<Service>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self {
            services: vec![Service::local(DEFAULT_LOCAL_SERVICE)],
        }
    }
}

fn content_stem(content_type: ContentType) -> Result<&'static str> {
    match content_type {
        ContentType::TagSiblings => Ok("siblings"),
        ContentType::TagParents => Ok("parents"),
        ContentType::Mappings => anyhow::bail!("Mappings have no relationship sessions"),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn remove_file(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

/// A data directory
#[derive(Debug)]
pub struct Repository {
    dir: PathBuf,
    registry: ServiceRegistry,
}

impl Repository {
    /// Open a data directory, creating nothing until something is saved
    pub fn open(dir: &Path) -> Result<Self> {
        let registry = read_json(&dir.join("services.json"))?.unwrap_or_default();
        Ok(Self {
            dir: dir.to_path_buf(),
            registry,
        })
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, key: &ServiceKey) -> PathBuf {
        self.dir.join("relationships").join(format!("{}.json", key.as_hex()))
    }

    fn session_path(&self, key: &ServiceKey, content_type: ContentType) -> Result<PathBuf> {
        Ok(self
            .dir
            .join("sessions")
            .join(format!("{}-{}.json", key.as_hex(), content_stem(content_type)?)))
    }

    // =========================================================================
    // Services
    // =========================================================================

    /// Persist the service registry
    pub fn save_registry(&self) -> Result<()> {
        write_json(&self.dir.join("services.json"), &self.registry)
    }

    /// Every registered service
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.registry.services
    }

    /// Look a service up by name or hex key
    pub fn find_service(&self, name_or_key: &str) -> Result<&Service> {
        self.registry
            .services
            .iter()
            .find(|s| s.name == name_or_key || s.key.as_hex() == name_or_key)
            .ok_or_else(|| TagError::UnknownService(name_or_key.to_string()).into())
    }

    /// Register a service
    pub fn add_service(&mut self, service: Service) -> Result<()> {
        if self.registry.services.iter().any(|s| s.key == service.key) {
            anyhow::bail!("Service already exists: {}", service.name);
        }
        info!("Registered {:?} service '{}'", service.kind, service.name);
        self.registry.services.push(service);
        Ok(())
    }

    /// Unregister a service and delete its data and sessions
    pub fn remove_service(&mut self, key: &ServiceKey) -> Result<bool> {
        let before = self.registry.services.len();
        self.registry.services.retain(|s| &s.key != key);
        if self.registry.services.len() == before {
            return Ok(false);
        }

        remove_file(&self.data_path(key))?;
        for content_type in [ContentType::TagSiblings, ContentType::TagParents] {
            remove_file(&self.session_path(key, content_type)?)?;
        }
        Ok(true)
    }

    // =========================================================================
    // Authoritative snapshots
    // =========================================================================

    /// Stored data for a service (empty if never written)
    pub fn load_data(&self, key: &ServiceKey) -> Result<ServiceData> {
        Ok(read_json(&self.data_path(key))?.unwrap_or_default())
    }

    /// Overwrite a service's stored data
    pub fn save_data(&self, key: &ServiceKey, data: &ServiceData) -> Result<()> {
        write_json(&self.data_path(key), data)
    }

    /// Authoritative store for one content type
    pub fn load_store(&self, key: &ServiceKey, content_type: ContentType) -> Result<StatusStore> {
        let data = self.load_data(key)?;
        data.store(content_type)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No relationship store for {}", content_type))
    }

    /// Rebuild both managers from every service's effective pairs
    pub fn load_managers(&self, siblings: &TagSiblingsManager, parents: &TagParentsManager) -> Result<()> {
        for service in self.services() {
            let data = self.load_data(&service.key)?;
            let known_tags: Option<HashSet<Tag>> =
                (!data.known_tags.is_empty()).then(|| data.known_tags.iter().cloned().collect());
            siblings.set_service(&service.key, data.siblings.effective_pairs(), known_tags.clone());
            parents.set_service(&service.key, data.parents.effective_pairs(), known_tags);
        }
        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// The persisted session, or a fresh one from the authoritative store
    pub fn open_session(&self, key: &ServiceKey, content_type: ContentType) -> Result<EditSession> {
        let authoritative = self.load_store(key, content_type)?;

        if let Some(session) = read_json::<EditSession>(&self.session_path(key, content_type)?)? {
            if session.original() != &authoritative {
                warn!(
                    "{} session on {} was opened at {} and the stored data has changed since",
                    content_type, key, session.opened_at
                );
            }
            return Ok(session);
        }

        Ok(EditSession::open(key.clone(), content_type, authoritative))
    }

    /// Persist a session; an unmodified one is discarded instead
    pub fn save_session(&self, session: &EditSession) -> Result<()> {
        let path = self.session_path(&session.service, session.content_type)?;
        if session.is_modified() {
            write_json(&path, session)
        } else {
            remove_file(&path).map(|_| ())
        }
    }

    /// Drop a persisted session
    pub fn discard_session(&self, key: &ServiceKey, content_type: ContentType) -> Result<bool> {
        remove_file(&self.session_path(key, content_type)?)
    }

    /// Every persisted session
    pub fn sessions(&self) -> Result<Vec<EditSession>> {
        let dir = self.dir.join("sessions");
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut sessions = Vec::new();
        for path in paths {
            if let Some(session) = read_json(&path)? {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    /// Diff a session, realise the updates against the stored snapshot and
    /// close the session
    pub fn commit_session(&self, service: &Service, session: &EditSession) -> Result<Vec<ContentUpdate>> {
        let updates = session.content_updates(service.kind);

        let mut data = self.load_data(&service.key)?;
        let store = data
            .store_mut(session.content_type)
            .ok_or_else(|| anyhow::anyhow!("No relationship store for {}", session.content_type))?;
        store.apply(&updates);
        self.save_data(&service.key, &data)?;

        self.discard_session(&service.key, session.content_type)?;
        debug!("Committed {} update(s) to {}", updates.len(), service.name);
        Ok(updates)
    }

    // =========================================================================
    // Display filters
    // =========================================================================

    /// Stored display filters (none if never written)
    pub fn load_display(&self) -> Result<TagDisplayManager> {
        let path = self.dir.join("display.json");
        if !path.exists() {
            return Ok(TagDisplayManager::new());
        }
        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        TagDisplayManager::load_string(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Write the display filters if they changed
    pub fn save_display(&self, manager: &TagDisplayManager) -> Result<()> {
        if !manager.is_dirty() {
            return Ok(());
        }
        let path = self.dir.join("display.json");
        fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create directory {}", self.dir.display()))?;
        fs::write(&path, manager.dump_string()?).with_context(|| format!("Failed to write {}", path.display()))?;
        manager.set_clean();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentAction, DisplayContext, Pair, RelationshipStatus, ServiceKind};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_directory_has_local_service() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::open(temp.path()).unwrap();

        assert_eq!(repo.services().len(), 1);
        assert!(repo.find_service(DEFAULT_LOCAL_SERVICE).unwrap().is_local());
        assert!(repo.find_service("nope").is_err());
    }

    #[test]
    fn test_registry_persists() {
        let temp = TempDir::new().unwrap();
        let mut repo = Repository::open(temp.path()).unwrap();
        repo.add_service(Service::repository("ptr", BTreeMap::new())).unwrap();
        assert!(repo.add_service(Service::repository("ptr", BTreeMap::new())).is_err());
        repo.save_registry().unwrap();

        let repo = Repository::open(temp.path()).unwrap();
        let ptr = repo.find_service("ptr").unwrap();
        assert_eq!(ptr.kind, ServiceKind::Repository);
        assert!(repo.find_service(ptr.key.as_hex()).is_ok());
    }

    #[test]
    fn test_session_survives_and_commits() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::open(temp.path()).unwrap();
        let service = repo.find_service(DEFAULT_LOCAL_SERVICE).unwrap().clone();

        let mut session = repo.open_session(&service.key, ContentType::TagParents).unwrap();
        session
            .current_mut()
            .set(Pair::new("cat", "animal"), RelationshipStatus::Pending);
        repo.save_session(&session).unwrap();

        let session = repo.open_session(&service.key, ContentType::TagParents).unwrap();
        assert!(session.is_modified());
        assert_eq!(repo.sessions().unwrap().len(), 1);

        let updates = repo.commit_session(&service, &session).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].action, ContentAction::Add);

        assert!(repo.sessions().unwrap().is_empty());
        let store = repo.load_store(&service.key, ContentType::TagParents).unwrap();
        assert_eq!(store.status(&Pair::new("cat", "animal")), Some(RelationshipStatus::Current));
    }

    #[test]
    fn test_unmodified_session_not_written() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::open(temp.path()).unwrap();
        let key = ServiceKey::from_name(DEFAULT_LOCAL_SERVICE);

        let session = repo.open_session(&key, ContentType::TagSiblings).unwrap();
        repo.save_session(&session).unwrap();
        assert!(repo.sessions().unwrap().is_empty());
    }

    #[test]
    fn test_managers_loaded_from_disk() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::open(temp.path()).unwrap();
        let key = ServiceKey::from_name(DEFAULT_LOCAL_SERVICE);

        let mut data = ServiceData::default();
        data.siblings.set(Pair::new("colour", "color"), RelationshipStatus::Current);
        data.parents.set(Pair::new("cat", "animal"), RelationshipStatus::Pending);
        data.parents.set(Pair::new("dog", "animal"), RelationshipStatus::Petitioned);
        repo.save_data(&key, &data).unwrap();

        let siblings = TagSiblingsManager::default();
        let parents = TagParentsManager::new();
        repo.load_managers(&siblings, &parents).unwrap();

        assert_eq!(siblings.collapse_tag(&key, "colour", false).unwrap(), "color");
        assert_eq!(parents.get_children(&key, "animal").len(), 1);
    }

    #[test]
    fn test_display_saved_only_when_dirty() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::open(temp.path()).unwrap();
        let manager = repo.load_display().unwrap();

        repo.save_display(&manager).unwrap();
        assert!(!temp.path().join("display.json").exists());

        let key = ServiceKey::from_name(DEFAULT_LOCAL_SERVICE);
        manager.hide_tag(DisplayContext::Storage, &key, "tagme");
        repo.save_display(&manager).unwrap();
        assert!(!manager.is_dirty());

        let restored = repo.load_display().unwrap();
        assert!(!restored.tag_ok(DisplayContext::Storage, &key, "tagme"));
    }
}
