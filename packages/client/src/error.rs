//! Error types for the chat client.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced on the session's error queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The server could not be reached
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// An established connection failed
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Nothing arrived from the server within the read deadline
    #[error("No frame received from server within {0:?}")]
    ReadTimeout(Duration),

    /// A frame could not be written within the write deadline
    #[error("Write did not complete within {0:?}")]
    WriteTimeout(Duration),

    /// An outgoing message could not be encoded
    #[error("Failed to serialize message: {0}")]
    Serialization(String),

    /// The attempt was superseded by `close` or a newer `connect`
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// The reconnect policy ran out of attempts
    #[error("Gave up reconnecting after {0} attempts")]
    ReconnectExhausted(u32),
}
