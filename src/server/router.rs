//! Out-of-band operational surface: health and metrics on a separate port.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::breaker::CircuitState;
use crate::server::state::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    // Unknown paths and unsupported methods both answer 404.
    Router::new()
        .route("/health", get(health_handler).fallback(not_found_handler))
        .route("/metrics", get(metrics_handler).fallback(not_found_handler))
        .fallback(not_found_handler)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

/// Healthy means the primary listener is up and the breaker is not open.
/// The log backend is reported but does not gate health: the synchronous
/// decision path works without it.
async fn health_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let breaker_state = state.breaker().state();
    let ws_up = state.ws_ready();
    let healthy = ws_up && breaker_state != CircuitState::Open;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "checks": {
                "websocket": if ws_up { "up" } else { "down" },
                "circuit_breaker": breaker_state.as_str(),
                "log_backend": if state.sink().is_connected() { "connected" } else { "disconnected" },
            },
        })),
    )
}

async fn metrics_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let stats = state.sink().stats().await;
    Json(json!({
        "circuit_breaker": {
            "state": state.breaker().state().as_str(),
            "failure_count": state.breaker().failure_count(),
        },
        "log_backend": {
            "connected": state.sink().is_connected(),
            "stream_length": stats.as_ref().map(|s| s.length),
            "last_stream_id": stats.as_ref().map(|s| s.last_id.clone()),
        },
        "connections": {
            "active": state.active_connections(),
        },
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
