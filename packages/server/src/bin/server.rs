//! WebSocket chat server with broadcast functionality.
//!
//! Every message received from a client is broadcast to all connected clients,
//! the sender included.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatterbox-server
//! cargo run --bin chatterbox-server -- --host 0.0.0.0 --port 3000 --debug
//! ```

use std::time::Duration;

use chatterbox_server::{config::PumpConfig, ui::Server};
use chatterbox_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatterbox-server")]
#[command(about = "WebSocket chat server with broadcast support", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// Seconds without any frame from a client before it is dropped
    #[arg(long, default_value = "60")]
    pong_wait: u64,

    /// Largest accepted inbound message, in bytes
    #[arg(long, default_value = "512")]
    max_message_size: usize,

    /// Outbound messages buffered per client before it is evicted
    #[arg(long, default_value = "256")]
    send_buffer: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logger(
        env!("CARGO_BIN_NAME"),
        if args.debug { "debug" } else { "info" },
    );

    let pump = PumpConfig::default()
        .with_pong_wait(Duration::from_secs(args.pong_wait.max(1)))
        .with_max_message_size(args.max_message_size)
        .with_send_buffer(args.send_buffer);

    if let Err(e) = Server::new(pump).run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
