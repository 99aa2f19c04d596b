//! TTL cache in front of any [`EntityDirectory`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::EntityDirectory;
use crate::error::DirectoryError;
use crate::models::NamedEntity;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Entry {
    fetched_at: Instant,
    entities: Vec<NamedEntity>,
}

#[derive(Debug, Default)]
struct CacheState {
    boards: Option<Entry>,
    members: Option<Entry>,
    lists: HashMap<String, Entry>,
}

/// Caches boards, members and per-board lists for `ttl`. Member lookups by
/// username always go to the inner directory. Errors are never cached.
pub struct CachedDirectory<D> {
    inner: D,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl<D: EntityDirectory> CachedDirectory<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Drop everything. Call after creating or renaming boards.
    pub fn invalidate(&self) {
        *self.state.write() = CacheState::default();
        debug!("Directory cache invalidated");
    }

    pub fn invalidate_lists(&self, board_id: &str) {
        self.state.write().lists.remove(board_id);
    }

    fn fresh(&self, entry: Option<&Entry>) -> Option<Vec<NamedEntity>> {
        entry
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.entities.clone())
    }

    fn entry(entities: &[NamedEntity]) -> Entry {
        Entry {
            fetched_at: Instant::now(),
            entities: entities.to_vec(),
        }
    }
}

#[async_trait]
impl<D: EntityDirectory> EntityDirectory for CachedDirectory<D> {
    async fn boards(&self) -> Result<Vec<NamedEntity>, DirectoryError> {
        let cached = self.fresh(self.state.read().boards.as_ref());
        if let Some(boards) = cached {
            return Ok(boards);
        }
        let boards = self.inner.boards().await?;
        debug!("Cached {} boards", boards.len());
        self.state.write().boards = Some(Self::entry(&boards));
        Ok(boards)
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<NamedEntity>, DirectoryError> {
        let cached = self.fresh(self.state.read().lists.get(board_id));
        if let Some(lists) = cached {
            return Ok(lists);
        }
        let lists = self.inner.lists(board_id).await?;
        self.state
            .write()
            .lists
            .insert(board_id.to_string(), Self::entry(&lists));
        Ok(lists)
    }

    async fn members(&self) -> Result<Vec<NamedEntity>, DirectoryError> {
        let cached = self.fresh(self.state.read().members.as_ref());
        if let Some(members) = cached {
            return Ok(members);
        }
        let members = self.inner.members().await?;
        self.state.write().members = Some(Self::entry(&members));
        Ok(members)
    }

    async fn member_by_username(
        &self,
        username: &str,
    ) -> Result<Option<NamedEntity>, DirectoryError> {
        self.inner.member_by_username(username).await
    }
}
