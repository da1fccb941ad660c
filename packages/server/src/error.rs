//! Error types for the chat server.

use std::time::Duration;

use thiserror::Error;

/// Reasons a connection's pump stops.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No frame arrived within the read deadline
    #[error("no frame received within {0:?}")]
    ReadTimeout(Duration),

    /// A frame could not be written within the write deadline
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    /// The peer sent a frame above the size limit
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Socket-level failure
    #[error("websocket error: {0}")]
    Transport(#[from] axum::Error),
}

/// Errors returned by [`crate::hub::HubHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// The hub loop has exited and no longer accepts commands
    #[error("hub is not running")]
    Stopped,
}
