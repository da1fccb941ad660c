//! Chat message envelope exchanged over the WebSocket.
//!
//! One JSON object per logical message:
//!
//! ```json
//! {"type":"chat","username":"alice","content":"hi","timestamp":"2024-03-01T07:05:09Z"}
//! ```
//!
//! `room` and `users` are omitted when absent. Text that does not decode as an
//! envelope is never rejected: it becomes a `chat` message from
//! [`UNKNOWN_AUTHOR`] whose content is the raw text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author used for payloads that are not envelopes.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Author of server-generated notices.
pub const SYSTEM_AUTHOR: &str = "System";

/// Message kind, serialized as the `type` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Chat,
    System,
    UserList,
}

/// Wire envelope for every chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Ordered display names, present on `user_list` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
}

impl Envelope {
    /// A chat message from `username`, stamped with the current time.
    pub fn chat(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Chat,
            username: username.into(),
            content: content.into(),
            timestamp: Utc::now(),
            room: None,
            users: None,
        }
    }

    /// A server notice such as "alice joined the chat".
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            ..Self::chat(SYSTEM_AUTHOR, content)
        }
    }

    /// The current presence list.
    pub fn user_list(users: Vec<String>) -> Self {
        Self {
            kind: MessageKind::UserList,
            users: Some(users),
            ..Self::chat(SYSTEM_AUTHOR, "")
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Decode a text payload, wrapping anything that is not an envelope into
    /// a plain chat message from [`UNKNOWN_AUTHOR`].
    pub fn parse_or_plain(raw: &str) -> Self {
        match serde_json::from_str::<Envelope>(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!("Payload is not an envelope ({}), treating as plain text", e);
                Self::chat(UNKNOWN_AUTHOR, raw)
            }
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Whether the message carries a usable author name.
    pub fn has_author(&self) -> bool {
        !self.username.trim().is_empty()
    }
}
