//! Connection status reported by the session and reconciled by consumers.

use std::fmt;

/// Phase of the connection to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Folds status events into the current phase.
///
/// Events can race (a reconnect timer firing just after a connection came
/// up), so a `Connecting` event never replaces `Connected`. Only
/// `Disconnected` or `Error` leave the connected phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusModel {
    current: ConnectionStatus,
}

impl StatusModel {
    pub fn current(&self) -> ConnectionStatus {
        self.current
    }

    pub fn is_connected(&self) -> bool {
        self.current == ConnectionStatus::Connected
    }

    /// Apply an event. Returns `false` when the event was ignored as stale.
    pub fn apply(&mut self, next: ConnectionStatus) -> bool {
        if self.current == ConnectionStatus::Connected && next == ConnectionStatus::Connecting {
            return false;
        }
        self.current = next;
        true
    }
}
