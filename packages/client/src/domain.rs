//! Pure decision logic used by the session.

use std::time::Duration;

/// Delay between a failure and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// When and how often the session retries after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Fixed wait before every retry
    pub delay: Duration,
    /// Consecutive failed attempts allowed before giving up; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Check if another attempt may be scheduled.
    ///
    /// # Arguments
    ///
    /// * `failed_attempts` - Retries already scheduled since the last successful connection
    pub fn should_attempt_reconnect(&self, failed_attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => failed_attempts < max,
            None => true,
        }
    }
}

/// Split a text frame into the envelopes it carries. The server joins queued
/// messages with newlines, one JSON object per line.
pub fn frame_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}
