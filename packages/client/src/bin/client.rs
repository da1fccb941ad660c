//! WebSocket chat client with automatic reconnection.
//!
//! Connects to a chat server, sends every line typed as a chat message and
//! prints what other users say. Lost connections are retried after a fixed
//! delay.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatterbox-client -- --user alice
//! cargo run --bin chatterbox-client -- -u bob --room rust --port 3000
//! ```

use std::time::Duration;

use chatterbox_client::{
    config::{ClientConfig, SessionConfig},
    domain::ReconnectPolicy,
    runner::run_client,
};
use chatterbox_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatterbox-client")]
#[command(about = "WebSocket chat client with automatic reconnection", long_about = None)]
struct Args {
    /// Name shown to other users
    #[arg(short = 'u', long)]
    user: String,

    /// Host of the chat server
    #[arg(short = 'H', long, default_value = "localhost")]
    host: String,

    /// Port of the chat server
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Room to join instead of the general chat
    #[arg(short = 'r', long)]
    room: Option<String>,

    /// Seconds to wait before reconnecting
    #[arg(long, default_value = "3")]
    reconnect_delay: u64,

    /// Give up after this many consecutive failed attempts
    #[arg(long)]
    max_reconnect_attempts: Option<u32>,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();

    let config = match (ClientConfig {
        host: args.host,
        port: args.port,
        username: args.user,
        room: args.room,
    })
    .validate()
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let session_config = SessionConfig::default().with_reconnect(ReconnectPolicy {
        delay: Duration::from_secs(args.reconnect_delay),
        max_attempts: args.max_reconnect_attempts,
    });

    if let Err(e) = run_client(config, session_config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
