//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::ui::state::AppState;

/// Health check endpoint, reporting the number of live connections
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.hub.connection_count().await {
        Ok(connections) => Ok(Json(serde_json::json!({
            "status": "ok",
            "connections": connections,
        }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
