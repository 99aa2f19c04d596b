//! Chat user to board user mapping.
//!
//! This module provides:
//! - Case-insensitive lookup by chat username
//! - Timestamps for when a link was created or last changed
//! - JSON persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::IdentityStoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub board_username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Explicit chat username -> board username links. Consulted before any
/// name-based member matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityMap {
    /// Lowercased chat username -> link
    links: BTreeMap<String, IdentityLink>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. A missing file is an empty map.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IdentityStoreError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No identity map at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let map: Self = serde_json::from_str(&content)?;
        info!("Loaded {} identity links from {}", map.len(), path.display());
        Ok(map)
    }

    /// Save as pretty JSON, creating the parent directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IdentityStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, chat_username: &str) -> Option<&str> {
        self.links
            .get(&Self::key(chat_username))
            .map(|link| link.board_username.as_str())
    }

    pub fn link(&self, chat_username: &str) -> Option<&IdentityLink> {
        self.links.get(&Self::key(chat_username))
    }

    /// Insert or replace a link. Returns the previous board username.
    pub fn insert(&mut self, chat_username: &str, board_username: &str) -> Option<String> {
        let now = Utc::now();
        let key = Self::key(chat_username);
        match self.links.get_mut(&key) {
            Some(link) => {
                let previous = std::mem::replace(&mut link.board_username, board_username.to_string());
                link.updated_at = now;
                Some(previous)
            }
            None => {
                self.links.insert(
                    key,
                    IdentityLink {
                        board_username: board_username.to_string(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                None
            }
        }
    }

    pub fn remove(&mut self, chat_username: &str) -> Option<String> {
        self.links
            .remove(&Self::key(chat_username))
            .map(|link| link.board_username)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All links, ordered by chat username.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &IdentityLink)> {
        self.links.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn key(chat_username: &str) -> String {
        chat_username.trim().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_keys() {
        let mut map = IdentityMap::new();
        assert!(map.insert("Anna.Kowalska", "annakowalska1").is_none());
        assert_eq!(map.get("anna.kowalska"), Some("annakowalska1"));
        assert_eq!(map.get(" ANNA.KOWALSKA "), Some("annakowalska1"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_replaces_and_keeps_created_at() {
        let mut map = IdentityMap::new();
        map.insert("olga", "olga_old");
        let created = map.link("olga").unwrap().created_at;

        assert_eq!(map.insert("Olga", "olga_new"), Some("olga_old".to_string()));
        let link = map.link("olga").unwrap();
        assert_eq!(link.board_username, "olga_new");
        assert_eq!(link.created_at, created);
        assert!(link.updated_at >= created);
    }

    #[test]
    fn test_remove() {
        let mut map = IdentityMap::new();
        map.insert("olga", "olga_k");
        assert_eq!(map.remove("OLGA"), Some("olga_k".to_string()));
        assert!(map.is_empty());
        assert!(map.remove("olga").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("identity_map.json");

        let mut map = IdentityMap::new();
        map.insert("anna.kowalska", "annakowalska1");
        map.insert("piotr", "piotr_w");
        map.save(&path).unwrap();

        let loaded = IdentityMap::load(&path).unwrap();
        assert_eq!(loaded, map);
        let keys: Vec<&str> = loaded.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["anna.kowalska", "piotr"]);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        assert!(IdentityMap::load(dir.path().join("missing.json")).unwrap().is_empty());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert!(matches!(
            IdentityMap::load(&corrupt),
            Err(IdentityStoreError::Json(_))
        ));
    }
}
