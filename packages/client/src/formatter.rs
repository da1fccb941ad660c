//! Message formatting utilities for client display.

use chatterbox_shared::{
    message::{Envelope, MessageKind},
    time::format_clock,
};

use crate::{error::ClientError, status::ConnectionStatus};

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format an inbound envelope
    ///
    /// # Arguments
    ///
    /// * `envelope` - The received message
    /// * `me` - The current user's name (to mark own messages)
    pub fn format_envelope(envelope: &Envelope, me: &str) -> String {
        match envelope.kind {
            MessageKind::Chat => {
                let me_suffix = if envelope.username == me { " (me)" } else { "" };
                format!(
                    "[{}] {}{}: {}",
                    format_clock(&envelope.timestamp),
                    envelope.username,
                    me_suffix,
                    envelope.content
                )
            }
            MessageKind::System => {
                format!("[{}] * {}", format_clock(&envelope.timestamp), envelope.content)
            }
            MessageKind::UserList => {
                Self::format_user_list(envelope.users.as_deref().unwrap_or_default(), me)
            }
        }
    }

    /// Format the list of online users
    pub fn format_user_list(users: &[String], me: &str) -> String {
        if users.is_empty() {
            return "Online: (nobody)".to_string();
        }
        let names: Vec<String> = users
            .iter()
            .map(|user| {
                if user == me {
                    format!("{} (me)", user)
                } else {
                    user.clone()
                }
            })
            .collect();
        format!("Online ({}): {}", users.len(), names.join(", "))
    }

    pub fn format_status(status: ConnectionStatus) -> String {
        match status {
            ConnectionStatus::Disconnected => "-- Disconnected --".to_string(),
            ConnectionStatus::Connecting => "-- Connecting... --".to_string(),
            ConnectionStatus::Connected => "-- Connected --".to_string(),
            ConnectionStatus::Error => "-- Connection error, retrying shortly --".to_string(),
        }
    }

    pub fn format_error(error: &ClientError) -> String {
        format!("! {}", error)
    }

    pub fn format_not_connected() -> String {
        "! Not connected to server. Cannot send message.".to_string()
    }
}
