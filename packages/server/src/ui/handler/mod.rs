//! Route handlers.

pub mod http;
pub mod websocket;

pub use http::health_check;
pub use websocket::{chat_handler, echo_handler, room_handler};
