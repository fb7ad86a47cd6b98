//! Request-lifecycle middleware: metrics, admission control and timeout
//! enforcement.
//!
//! Layering order is fixed: metrics outermost, then admission, then timeout,
//! then the handler. So each request runs metrics-start → admission-check →
//! timeout-arm → dispatch → (timeout-disarm | timeout-fire) →
//! metrics-finalize → admission-release, and the finalize/release steps run
//! exactly once on every terminal path.

pub mod admission;
pub mod metrics;
pub mod timeout;
