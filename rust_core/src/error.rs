//! Error types for the collaborators the resolution core talks to.
//!
//! "No match" and "many matches" are not errors: they are variants of
//! [`crate::models::ResolutionResult`]. A disambiguation timeout is a
//! [`crate::disambiguation::SelectionOutcome`], also not an error.

use thiserror::Error;

/// Failures of the board/list/member directory provider.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Directory API error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode directory response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

/// Failures of the interactive reply channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Reply channel closed")]
    Closed,

    #[error("Failed to send prompt: {0}")]
    Send(String),

    #[error("Failed to edit prompt {message_id}: {reason}")]
    Edit { message_id: String, reason: String },

    #[error("Failed to delete message {message_id}: {reason}")]
    Delete { message_id: String, reason: String },
}

/// Failures loading or saving the identity map file.
#[derive(Error, Debug)]
pub enum IdentityStoreError {
    #[error("Identity map I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity map is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the lookup flows, which touch both the directory and the chat.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
