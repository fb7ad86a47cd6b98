//! Liveness, health and metrics reporting.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{db, routes::comments::AppState};

/// `GET /` — liveness only.
pub async fn root() -> &'static str {
    "API is running"
}

/// `GET /health` — 200 while the database answers, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> Response {
    if db::ping(&state.pool).await {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "db": "connected" })),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "db": "not connected" })),
        )
            .into_response()
    }
}

/// `GET /metrics` — plain-text counter snapshot.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.snapshot().render(),
    )
}
