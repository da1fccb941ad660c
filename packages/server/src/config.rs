//! Per-connection pump settings.

use std::time::Duration;

/// Maximum time allowed to write a frame to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Maximum time allowed between two frames from the peer.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum accepted size of a single inbound frame, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Capacity of each connection's outbound queue.
pub const SEND_BUFFER: usize = 256;

/// Broadcasts the hub holds before read pumps have to wait for it.
pub const BROADCAST_BUFFER: usize = 64;

/// Timing and size limits applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpConfig {
    pub write_wait: Duration,
    /// Read deadline; reset by every frame received, pongs included.
    pub pong_wait: Duration,
    /// Keepalive interval. Must stay shorter than `pong_wait`.
    pub ping_period: Duration,
    pub max_message_size: usize,
    pub send_buffer: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: ping_period_for(PONG_WAIT),
            max_message_size: MAX_MESSAGE_SIZE,
            send_buffer: SEND_BUFFER,
        }
    }
}

impl PumpConfig {
    /// Change the read deadline, keeping the ping interval at 9/10 of it.
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self.ping_period = ping_period_for(pong_wait);
        self
    }

    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn with_send_buffer(mut self, send_buffer: usize) -> Self {
        self.send_buffer = send_buffer.max(1);
        self
    }
}

fn ping_period_for(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}
