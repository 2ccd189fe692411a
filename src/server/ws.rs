//! Primary transport: one JSON request per text frame over a persistent
//! WebSocket. Frames on a connection are handled to completion in arrival
//! order, so responses never reorder within a connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

use crate::server::dispatch;
use crate::server::state::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    Router::new().route("/ws", get(websocket_handler))
}

async fn websocket_handler(
    State(state): State<ServeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ServeState) {
    let active = state.connection_opened();
    debug!(active, "interceptor client connected");

    let welcome = json!({
        "type": "connected",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().timestamp_millis(),
    });
    if socket.send(Message::Text(welcome.to_string())).await.is_err() {
        state.connection_closed();
        return;
    }

    while let Some(message) = socket.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Some(reply) = dispatch::handle_frame(&state, &text).await {
                    if socket.send(Message::Text(reply)).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            Ok(Message::Close(frame)) => {
                debug!(?frame, "connection closed by client");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(error = %err, "websocket receive error");
                break;
            }
        }
    }

    state.connection_closed();
    debug!(active = state.active_connections(), "interceptor client disconnected");
}
