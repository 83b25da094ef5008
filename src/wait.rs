//! The single suspension point every channel and the thread pool are built
//! on.

use std::time::{Duration, Instant};

/// Something a caller can block on until it becomes "ready", where
/// readiness is defined by the implementor (data present, timer elapsed,
/// socket readable, ...).
///
/// Implementors need only provide [`Wait::wait_for`]; [`Wait::wait_until`]
/// and [`Wait::poll`] are derived from it and exist for callers that think
/// in absolute deadlines or want a non-blocking check.
pub trait Wait {
    /// Blocks until ready or until `timeout` elapses, returning whether the
    /// wait ended because the condition became true (as opposed to timing
    /// out). A `timeout` of [`Duration::ZERO`] must behave like
    /// [`Wait::poll`].
    fn wait_for(&self, timeout: Duration) -> bool;

    /// Blocks until ready or until the clock reaches `deadline`.
    fn wait_until(&self, deadline: Instant) -> bool {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.wait_for(remaining)
    }

    /// Non-blocking readiness check.
    fn poll(&self) -> bool {
        self.wait_for(Duration::ZERO)
    }
}
