//! Admission control: a hard ceiling on requests concurrently in flight.
//!
//! Excess load is rejected immediately with 503 "server busy" rather than
//! queued; the caller is expected to retry. A rejected request never touches
//! the active counter, so `active <= max_concurrent` holds at every
//! observation point.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::Request,
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub struct AdmissionController {
    active: AtomicUsize,
    max_concurrent: usize,
}

/// Proof of admission. Dropping it releases the slot, so the decrement runs
/// exactly once per admitted request no matter which path (normal
/// completion, handler error, timeout) ends it.
#[derive(Debug)]
pub struct AdmissionPermit {
    controller: Arc<AdmissionController>,
}

impl AdmissionController {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max_concurrent,
        }
    }

    /// Claim a slot, or `None` when the ceiling is reached. The CAS loop
    /// only increments from a value below the ceiling, so the counter can
    /// never be observed above it, not even transiently.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionPermit> {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.max_concurrent {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(AdmissionPermit {
                        controller: Arc::clone(self),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let prev = self.controller.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "admission counter underflow");
    }
}

/// Gate evaluated before dispatch. Holds the permit across the inner call.
pub async fn admit(
    State(controller): State<Arc<AdmissionController>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(_permit) = controller.try_admit() else {
        tracing::warn!(
            active = controller.active(),
            max = controller.max_concurrent(),
            "admission ceiling reached, rejecting request"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "server busy" })),
        )
            .into_response();
    };

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_enforced_and_released() {
        let controller = Arc::new(AdmissionController::new(1));

        let permit = controller.try_admit().expect("first request admitted");
        assert_eq!(controller.active(), 1);
        assert!(controller.try_admit().is_none());

        drop(permit);
        assert_eq!(controller.active(), 0);
        assert!(controller.try_admit().is_some());
    }

    #[test]
    fn admits_up_to_ceiling_rejects_excess() {
        let controller = Arc::new(AdmissionController::new(4));

        let permits: Vec<_> = (0..6).map(|_| controller.try_admit()).collect();
        let admitted = permits.iter().filter(|p| p.is_some()).count();
        assert_eq!(admitted, 4);
        assert_eq!(controller.active(), 4);
    }

    #[tokio::test]
    async fn active_never_exceeds_ceiling_under_contention() {
        let controller = Arc::new(AdmissionController::new(8));
        let mut handles = Vec::new();

        for _ in 0..64 {
            let controller = Arc::clone(&controller);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    if let Some(permit) = controller.try_admit() {
                        assert!(controller.active() <= controller.max_concurrent());
                        tokio::task::yield_now().await;
                        drop(permit);
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(controller.active(), 0);
    }
}
