//! Interactive Disambiguation
//!
//! When resolution is ambiguous the requesting user picks a candidate in chat.
//! Two session types share the [`ReplyChannel`] boundary:
//! - [`DisambiguationSession`]: numbered list, numeric reply, 30s window
//! - [`MemberMenuSession`]: select menu with a "none of these" option, 60s window
//!
//! A session waits for one qualifying event or its deadline, whichever comes
//! first. Timeout is an outcome, not an error. The window opens once the
//! prompt is delivered, and events that arrived before that are dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ChannelError;
use crate::models::{NamedEntity, MAX_CANDIDATES};

pub mod memory;
pub mod menu;
pub mod numbered;

pub use memory::{MemoryChannel, MemoryChannelHandle, OutboundRecord};
pub use menu::MemberMenuSession;
pub use numbered::DisambiguationSession;

pub const BOARD_SELECTION_WINDOW: Duration = Duration::from_secs(30);
pub const MEMBER_SELECTION_WINDOW: Duration = Duration::from_secs(60);

// ============================================================================
// Prompts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTone {
    Info,
    Question,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectMenu {
    pub menu_id: String,
    pub placeholder: String,
    pub options: Vec<MenuOption>,
}

/// A rendered message for the chat transport. Plain lines of text, an
/// optional title and an optional select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub tone: PromptTone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<SelectMenu>,
}

impl Prompt {
    pub fn new(tone: PromptTone, lines: Vec<String>) -> Self {
        Self {
            tone,
            title: None,
            lines,
            menu: None,
        }
    }

    /// Single-line prompt.
    pub fn status(tone: PromptTone, line: impl Into<String>) -> Self {
        Self::new(tone, vec![line.into()])
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_menu(mut self, menu: SelectMenu) -> Self {
        self.menu = Some(menu);
        self
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Transport id of a message the bot sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub String);

impl MessageHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Something a user did in the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Text {
        message_id: String,
        author_id: String,
        content: String,
    },
    MenuChoice {
        menu_id: String,
        author_id: String,
        value: String,
    },
}

impl InboundEvent {
    pub fn author_id(&self) -> &str {
        match self {
            InboundEvent::Text { author_id, .. } | InboundEvent::MenuChoice { author_id, .. } => {
                author_id
            }
        }
    }
}

// ============================================================================
// Reply Channel
// ============================================================================

/// The chat surface a session needs: send, receive, edit, delete.
///
/// One channel value is scoped to one chat channel. `next_message` returns
/// `None` once the transport is gone.
#[async_trait]
pub trait ReplyChannel: Send {
    async fn send_prompt(&mut self, prompt: &Prompt) -> Result<MessageHandle, ChannelError>;

    async fn next_message(&mut self) -> Option<InboundEvent>;

    /// Drop every event already buffered, without waiting. Returns how many
    /// were dropped.
    fn discard_pending(&mut self) -> usize;

    async fn edit_prompt(
        &mut self,
        handle: &MessageHandle,
        prompt: &Prompt,
    ) -> Result<(), ChannelError>;

    async fn delete_message(&mut self, message_id: &str) -> Result<(), ChannelError>;
}

// ============================================================================
// Session State
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Selected(NamedEntity),
    /// The user explicitly picked "none of these", or there was nothing to pick.
    Declined,
    TimedOut,
}

impl SelectionOutcome {
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            SelectionOutcome::Selected(entity) => Some(&entity.id),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<NamedEntity> {
        match self {
            SelectionOutcome::Selected(entity) => Some(entity),
            _ => None,
        }
    }
}

/// Lives for exactly one selection cycle.
#[derive(Debug, Clone)]
pub struct DisambiguationState {
    pub session_id: Uuid,
    /// At most [`MAX_CANDIDATES`], in presentation order.
    pub candidates: Vec<NamedEntity>,
    pub requester_id: String,
    /// How long the requester has to answer once the prompt is out.
    pub window: Duration,
}

impl DisambiguationState {
    pub fn new(mut candidates: Vec<NamedEntity>, requester_id: impl Into<String>, window: Duration) -> Self {
        candidates.truncate(MAX_CANDIDATES);
        Self {
            session_id: Uuid::new_v4(),
            candidates,
            requester_id: requester_id.into(),
            window,
        }
    }

    /// Deadline for a prompt delivered just now.
    pub fn deadline_from_now(&self) -> Instant {
        Instant::now() + self.window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSettings {
    pub board_window: Duration,
    pub member_window: Duration,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            board_window: BOARD_SELECTION_WINDOW,
            member_window: MEMBER_SELECTION_WINDOW,
        }
    }
}
