//! Logging setup utilities for the chat binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Enables logging for the chatterbox crates and the calling binary. The
/// level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "chatterbox-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info")
///
/// # Examples
///
/// ```no_run
/// use chatterbox_shared::logger::setup_logger;
///
/// setup_logger("chatterbox-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the filter directives used when `RUST_LOG` is not set.
fn default_directives(binary_name: &str, level: &str) -> String {
    let mut directives: Vec<String> = [
        "chatterbox_shared",
        "chatterbox_server",
        "chatterbox_client",
        "tower_http",
    ]
    .iter()
    .map(|target| format!("{}={}", target, level))
    .collect();
    directives.push(format!("{}={}", binary_name.replace('-', "_"), level));
    directives.join(",")
}
