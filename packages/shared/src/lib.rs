//! Code shared by the Chatterbox server and client: the wire envelope,
//! logging setup and time formatting.

pub mod logger;
pub mod message;
pub mod time;
