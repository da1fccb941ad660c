//! HTTP surface of the chat server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::{Server, ServerError, router};
