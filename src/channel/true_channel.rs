use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Channel, EventChannel};
use crate::wait::Wait;

/// Always ready; `wait_for` returns immediately. Useful as a sentinel event
/// channel for a dispatch task that should run on every sweep.
#[derive(Debug, Default)]
pub struct TrueChannel {
    open: AtomicBool,
}

impl TrueChannel {
    pub fn new() -> Self {
        TrueChannel { open: AtomicBool::new(true) }
    }
}

impl Wait for TrueChannel {
    fn wait_for(&self, _timeout: Duration) -> bool {
        true
    }
}

impl Channel for TrueChannel {
    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }

    fn is_shared(&self) -> bool {
        true
    }
}

impl EventChannel for TrueChannel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_ready_until_closed() {
        let c = TrueChannel::new();
        assert!(c.poll());
        c.close();
        assert!(c.is_closed());
        assert!(c.poll());
    }
}
