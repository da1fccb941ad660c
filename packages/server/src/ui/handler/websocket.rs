//! WebSocket upgrade handlers.
//!
//! Any origin is accepted. Room connections join the same broadcast domain as
//! `/ws/chat`; the room name is only logged.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{connection, ui::state::AppState};

pub async fn chat_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    tracing::debug!("Chat connection requested");
    upgrade(ws, &state)
}

pub async fn room_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Result<Response, StatusCode> {
    if room_name.trim().is_empty() {
        tracing::warn!("Rejecting room connection without a room name");
        return Err(StatusCode::BAD_REQUEST);
    }
    tracing::info!("Connection to room '{}'", room_name);
    Ok(upgrade(ws, &state))
}

/// Echoes every data frame back to the sender, for manual testing.
pub async fn echo_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(state.pump.max_message_size)
        .on_failed_upgrade(|e| tracing::error!("WebSocket upgrade error: {}", e))
        .on_upgrade(echo)
}

fn upgrade(ws: WebSocketUpgrade, state: &AppState) -> Response {
    let hub = state.hub.clone();
    let config = state.pump;
    ws.max_message_size(config.max_message_size)
        .on_failed_upgrade(|e| tracing::error!("WebSocket upgrade error: {}", e))
        .on_upgrade(move |socket| connection::serve(socket, hub, config))
}

async fn echo(mut socket: WebSocket) {
    tracing::info!("Echo connection established");

    while let Some(frame) = socket.recv().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Echo WebSocket error: {}", e);
                break;
            }
        };

        match frame {
            Message::Text(_) | Message::Binary(_) => {
                tracing::debug!("Echo received {:?}", frame);
                if let Err(e) = socket.send(frame).await {
                    tracing::warn!("Echo write error: {}", e);
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    tracing::info!("Echo connection closed");
}
