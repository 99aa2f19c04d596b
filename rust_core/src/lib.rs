//! TaskBridge Core - name resolution between chat commands and the task board.
//!
//! This module provides:
//! - Name normalization (case, accents, punctuation, board prefixes)
//! - Edit-distance similarity and composite candidate scoring
//! - Exact-then-fuzzy entity resolution for boards, lists and members
//! - A stricter near-duplicate detector for "did you mean" prompts
//! - Interactive, time-bounded disambiguation over a reply channel
//! - Directory providers (Trello REST, static, TTL cache) and the identity map
//! - Caller-level lookup flows (board confirmation, list fallback, member lookup)

pub mod clients;
pub mod directory;
pub mod disambiguation;
pub mod error;
pub mod identity;
pub mod lookup;
pub mod matching;
pub mod models;
pub mod redis;

pub use error::{ChannelError, DirectoryError, IdentityStoreError, LookupError};
pub use matching::{EntityResolver, ResolveMode};
pub use models::{EntityKind, NamedEntity, ResolutionResult, ScoredCandidate};
