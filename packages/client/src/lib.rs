//! Chat client: a reconnecting WebSocket session that reports messages,
//! errors and status changes through non-blocking queues.

pub mod config;
pub mod domain;
pub mod error;
pub mod formatter;
pub mod runner;
pub mod session;
pub mod status;
mod ui;

pub use session::{ClientSession, SessionEvents};
pub use status::{ConnectionStatus, StatusModel};
