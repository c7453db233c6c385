use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::metrics;

/// Banner pointing clients at the WebSocket endpoint
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Yui AI Companion API - WebSocket endpoint at /ws/{user_name}"
    }))
}

/// Service health with the active provider and session count
pub async fn api_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();
    let status = if snapshot.errors.websocket == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.router.provider_name().to_string(),
        sessions: state.registry.len().await as u64,
        uptime_secs: snapshot.uptime_secs,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe - 200 once the memory database answers
pub async fn health_ready_handler(State(state): State<AppState>) -> Response {
    if state.db.pool.acquire().await.is_ok() {
        Json(serde_json::json!({
            "status": "ready",
            "database": "connected"
        }))
        .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected"
            })),
        )
            .into_response()
    }
}
