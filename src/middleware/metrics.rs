//! Process-wide request metrics.
//!
//! One `RequestMetrics` instance lives for the process lifetime, shared via
//! `Arc` and updated exactly once per completed request by the outermost
//! middleware. Counters are never reset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Request, extract::State, middleware::Next, response::Response};

#[derive(Debug, Default)]
pub struct RequestMetrics {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Point-in-time view of the counters. The ratios are computed on demand and
/// defined as 0 when no requests have completed yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request. A server-error status counts toward
    /// `errors_total`.
    pub fn record(&self, is_server_error: bool, elapsed_ms: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        if is_server_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.total_requests.load(Ordering::Relaxed);
        let errors = self.total_errors.load(Ordering::Relaxed);
        let latency = self.total_latency_ms.load(Ordering::Relaxed);

        let (avg_latency_ms, error_rate) = if requests == 0 {
            (0.0, 0.0)
        } else {
            (latency as f64 / requests as f64, errors as f64 / requests as f64)
        };

        MetricsSnapshot {
            requests_total: requests,
            errors_total: errors,
            avg_latency_ms,
            error_rate,
        }
    }
}

impl MetricsSnapshot {
    /// Plain-text rendering served by `GET /metrics`.
    pub fn render(&self) -> String {
        format!(
            "requests_total {}\nerrors_total {}\navg_latency_ms {:.3}\nerror_rate {:.6}\n",
            self.requests_total, self.errors_total, self.avg_latency_ms, self.error_rate
        )
    }
}

/// Outermost middleware: times the request, updates the counters once the
/// response exists (whatever path produced it) and emits one structured log
/// line per request.
pub async fn track(
    State(metrics): State<Arc<RequestMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status();
    metrics.record(status.is_server_error(), elapsed_ms);
    tracing::info!(
        %method,
        %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        "request completed"
    );

    response
}
