//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{config::PumpConfig, hub::Hub};

use super::{
    handler::{chat_handler, echo_handler, health_check, room_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Error type returned by [`Server::run`] and [`Server::serve`].
pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// WebSocket chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(PumpConfig::default());
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    pump: PumpConfig,
}

impl Server {
    /// Create a server applying `pump` limits to every connection
    pub fn new(pump: PumpConfig) -> Self {
        Self { pump }
    }

    /// Run the WebSocket chat server until Ctrl+C or SIGTERM
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        let local_addr = listener.local_addr()?;
        tracing::info!("Chat server listening on {}", local_addr);
        tracing::info!("WebSocket endpoints:");
        tracing::info!("  - Chat: ws://{}/ws/chat", local_addr);
        tracing::info!("  - Room: ws://{}/ws/room/{{room_name}}", local_addr);
        tracing::info!("  - Echo: ws://{}/ws/echo", local_addr);
        tracing::info!("Health check: http://{}/health", local_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let hub = Hub::spawn();
        let app = router(Arc::new(AppState {
            hub,
            pump: self.pump,
        }));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Build the route table around a running hub
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws/chat", get(chat_handler))
        .route("/ws/room/{room_name}", get(room_handler))
        .route("/ws/echo", get(echo_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
