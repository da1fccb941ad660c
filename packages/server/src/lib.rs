//! Chat server: a hub that owns every live WebSocket connection and fans
//! messages out to all of them.
//!
//! - [`hub`]: the registry and broadcast dispatcher
//! - [`connection`]: read and write pumps for one socket
//! - [`ui`]: axum routes and the [`ui::Server`] runner

pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod ui;
