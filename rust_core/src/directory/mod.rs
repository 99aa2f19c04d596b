//! Board/list/member directory providers.
//!
//! The resolution core never owns entities; it asks an [`EntityDirectory`]
//! for them on every call. Caching is the provider's business, see
//! [`CachedDirectory`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::DirectoryError;
use crate::models::NamedEntity;

pub mod cache;

pub use cache::CachedDirectory;

/// Source of boards, lists and members.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Open boards visible to the bot.
    async fn boards(&self) -> Result<Vec<NamedEntity>, DirectoryError>;

    /// Open lists on one board.
    async fn lists(&self, board_id: &str) -> Result<Vec<NamedEntity>, DirectoryError>;

    async fn members(&self) -> Result<Vec<NamedEntity>, DirectoryError>;

    /// Look a member up by board username. `Ok(None)` when no such user exists.
    async fn member_by_username(
        &self,
        username: &str,
    ) -> Result<Option<NamedEntity>, DirectoryError>;
}

// ============================================================================
// Static Directory
// ============================================================================

/// Fixed in-memory entity sets. Counts fetches so caching can be observed.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    boards: Vec<NamedEntity>,
    lists: HashMap<String, Vec<NamedEntity>>,
    members: Vec<NamedEntity>,
    fetches: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_board(mut self, id: &str, name: &str) -> Self {
        self.boards.push(NamedEntity::board(id, name));
        self
    }

    pub fn with_list(mut self, board_id: &str, id: &str, name: &str) -> Self {
        self.lists
            .entry(board_id.to_string())
            .or_default()
            .push(NamedEntity::list(id, name));
        self
    }

    pub fn with_member(mut self, id: &str, full_name: &str, username: &str) -> Self {
        self.members.push(NamedEntity::member(id, full_name, username));
        self
    }

    /// Make every following call fail with `DirectoryError::Other(reason)`.
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Number of calls served so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn begin_fetch(&self) -> Result<(), DirectoryError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match self.failure.lock().as_ref() {
            Some(reason) => Err(DirectoryError::Other(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EntityDirectory for StaticDirectory {
    async fn boards(&self) -> Result<Vec<NamedEntity>, DirectoryError> {
        self.begin_fetch()?;
        Ok(self.boards.clone())
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<NamedEntity>, DirectoryError> {
        self.begin_fetch()?;
        Ok(self.lists.get(board_id).cloned().unwrap_or_default())
    }

    async fn members(&self) -> Result<Vec<NamedEntity>, DirectoryError> {
        self.begin_fetch()?;
        Ok(self.members.clone())
    }

    async fn member_by_username(
        &self,
        username: &str,
    ) -> Result<Option<NamedEntity>, DirectoryError> {
        self.begin_fetch()?;
        Ok(self
            .members
            .iter()
            .find(|m| {
                m.username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(username))
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_board("b1", "[OZ] 1 - Franki Kancelaria")
            .with_list("b1", "l1", "bazowe")
            .with_list("b1", "l2", "Przydzielone - Agnieszka")
            .with_member("m1", "Agnieszka Nowak", "agnieszkanowak")
    }

    #[tokio::test]
    async fn test_static_directory_serves_entities() {
        let directory = directory();
        assert_eq!(directory.boards().await.unwrap().len(), 1);
        assert_eq!(directory.lists("b1").await.unwrap().len(), 2);
        assert!(directory.lists("missing").await.unwrap().is_empty());
        assert_eq!(directory.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_member_by_username_is_case_insensitive() {
        let directory = directory();
        let member = directory.member_by_username("AgnieszkaNowak").await.unwrap();
        assert_eq!(member.map(|m| m.id), Some("m1".to_string()));
        assert!(directory.member_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let directory = directory();
        directory.fail_with("board API down");
        assert!(matches!(
            directory.boards().await,
            Err(DirectoryError::Other(reason)) if reason == "board API down"
        ));
        directory.recover();
        assert!(directory.boards().await.is_ok());
    }
}
