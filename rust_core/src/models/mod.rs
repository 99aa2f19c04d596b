// Shared models for the resolution core and the TaskBridge services
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matching::normalize::strip_board_prefix;

/// Upper bound on candidates offered to the user in one disambiguation prompt.
pub const MAX_CANDIDATES: usize = 5;

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Board,
    List,
    Member,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Board => "board",
            EntityKind::List => "list",
            EntityKind::Member => "member",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named object from the task board. Identity is `id`; `raw_name` is the
/// display text that queries are matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedEntity {
    pub id: String,
    pub raw_name: String,
    pub kind: EntityKind,
    /// Board-side username, only set for members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl NamedEntity {
    pub fn new(id: impl Into<String>, raw_name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            raw_name: raw_name.into(),
            kind,
            username: None,
        }
    }

    pub fn board(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, EntityKind::Board)
    }

    pub fn list(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, EntityKind::List)
    }

    pub fn member(
        id: impl Into<String>,
        full_name: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::new(id, full_name, EntityKind::Member)
        }
    }

    /// Text used for matching: boards lose their `[TAG] 12 -` prefix,
    /// lists and members are only trimmed.
    pub fn match_name(&self) -> String {
        match self.kind {
            EntityKind::Board => strip_board_prefix(&self.raw_name),
            EntityKind::List | EntityKind::Member => self.raw_name.trim().to_string(),
        }
    }
}

/// An entity with its score against one query. Transient, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub entity: NamedEntity,
    pub distance: usize,
    pub score: f64,
}

// ============================================================================
// Resolution Result
// ============================================================================

/// The only output contract of the resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Unique(NamedEntity),
    /// Two to [`MAX_CANDIDATES`] candidates, best (or first discovered) first.
    Ambiguous(Vec<NamedEntity>),
    NotFound,
}

impl ResolutionResult {
    /// Build a result from matches already in presentation order.
    pub fn from_matches(mut matches: Vec<NamedEntity>) -> Self {
        match matches.len() {
            0 => ResolutionResult::NotFound,
            1 => ResolutionResult::Unique(matches.remove(0)),
            _ => {
                matches.truncate(MAX_CANDIDATES);
                ResolutionResult::Ambiguous(matches)
            }
        }
    }

    pub fn unique(&self) -> Option<&NamedEntity> {
        match self {
            ResolutionResult::Unique(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn candidates(&self) -> &[NamedEntity] {
        match self {
            ResolutionResult::Unique(entity) => std::slice::from_ref(entity),
            ResolutionResult::Ambiguous(candidates) => candidates,
            ResolutionResult::NotFound => &[],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolutionResult::NotFound)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionResult::Unique(_) => "unique",
            ResolutionResult::Ambiguous(_) => "ambiguous",
            ResolutionResult::NotFound => "not_found",
        }
    }
}

// ============================================================================
// Task Target
// ============================================================================

/// Where a new task goes and who gets assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTarget {
    pub board: NamedEntity,
    pub list: NamedEntity,
    /// True when the requested person's list did not exist and the default list was used.
    pub used_default_list: bool,
    /// Creator, list person, then mentioned users; no duplicates.
    pub member_ids: Vec<String>,
}

// ============================================================================
// Resolver Service Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveKind {
    Board,
    List,
    Member,
    Task,
}

/// Request published by the chat gateway on [`channels::RESOLVE_REQUESTS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub request_id: String,
    pub requester_id: String,
    pub channel_id: String,
    pub kind: ResolveKind,
    /// Board name for `board`/`task`, list person for `list`, chat username for `member`.
    pub query: String,
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default)]
    pub person: Option<String>,
    #[serde(default)]
    pub requester_username: Option<String>,
    #[serde(default)]
    pub mentioned_usernames: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    Resolved,
    NotFound,
    TimedOut,
    Declined,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub request_id: String,
    pub status: ResolveStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<NamedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TaskTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolveResponse {
    pub fn new(request_id: impl Into<String>, status: ResolveStatus) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            entity: None,
            target: None,
            error: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(request_id, ResolveStatus::Failed)
        }
    }
}

/// Request to map a chat username to a board username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequest {
    pub request_id: String,
    pub chat_username: String,
    pub board_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
    pub request_id: String,
    pub linked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<NamedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Redis Channels
// ============================================================================

pub mod channels {
    pub const RESOLVE_REQUESTS: &str = "taskbridge:resolve:request";
    pub const RESOLVE_RESPONSE_PREFIX: &str = "taskbridge:resolve:response:";
    pub const IDENTITY_LINK_REQUESTS: &str = "taskbridge:identity:link";
    pub const IDENTITY_LINK_RESPONSE_PREFIX: &str = "taskbridge:identity:link:response:";
    pub const CHAT_OUTBOUND: &str = "chat:outbound";
    pub const CHAT_INBOUND_PREFIX: &str = "chat:inbound:";

    pub fn resolve_response(request_id: &str) -> String {
        format!("{}{}", RESOLVE_RESPONSE_PREFIX, request_id)
    }

    pub fn link_response(request_id: &str) -> String {
        format!("{}{}", IDENTITY_LINK_RESPONSE_PREFIX, request_id)
    }

    pub fn chat_inbound(channel_id: &str) -> String {
        format!("{}{}", CHAT_INBOUND_PREFIX, channel_id)
    }
}
