//! Chat message model consumed by the message pipeline.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Model response; the only role expected to carry artifacts.
    Assistant,
    /// Instructions injected by the host application.
    System,
}

/// A chat message with the cumulative text received so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    /// Stable identifier; one parser cursor exists per id.
    pub id: String,
    /// Message author.
    pub role: Role,
    /// Entire text observed so far, not a delta.
    pub content: String,
}

impl Message {
    /// Construct an assistant message.
    #[must_use]
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Construct a user message.
    #[must_use]
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
        }
    }

    /// Whether the pipeline runs this message through the parser.
    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant)
    }
}
