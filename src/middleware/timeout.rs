//! Per-request deadline enforcement.
//!
//! The governor arms a deadline around the inner service future. Whichever
//! resolves first wins: either the handler's response comes back (the timer
//! is disarmed and has no effect) or the deadline fires and a 503 "request
//! timeout" is returned instead. The losing branch is dropped, so exactly
//! one response is ever produced per request.
//!
//! Firing cancels the in-flight handler future at its next suspension point.
//! Outbound work it already issued (a database write, an external API call)
//! is not revoked and may complete after the client received the timeout.

use std::time::Duration;

use axum::{
    extract::Request,
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Deadline applied to every dispatched request.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline(pub Duration);

impl RequestDeadline {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

pub async fn enforce(
    State(RequestDeadline(deadline)): State<RequestDeadline>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(%method, %path, timeout_ms = deadline.as_millis() as u64, "request timed out");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "request timeout" })),
            )
                .into_response()
        }
    }
}
