use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{Channel, EventChannel};
use crate::wait::Wait;

/// Never ready on its own; only [`FalseChannel::close`] ever makes it fire.
/// The mirror image of [`super::TrueChannel`] -- useful as a shutdown latch
/// shared between threads.
#[derive(Debug, Default)]
pub struct FalseChannel {
    open: Mutex<bool>,
    cv: Condvar,
}

impl FalseChannel {
    pub fn new() -> Self {
        FalseChannel { open: Mutex::new(true), cv: Condvar::new() }
    }
}

impl Wait for FalseChannel {
    fn wait_for(&self, timeout: Duration) -> bool {
        let guard = self.open.lock().unwrap();
        if !*guard {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let (guard, _) = self.cv.wait_timeout_while(guard, timeout, |open| *open).unwrap();
        !*guard
    }
}

impl Channel for FalseChannel {
    fn close(&self) {
        let mut guard = self.open.lock().unwrap();
        *guard = false;
        self.cv.notify_all();
    }

    fn is_closed(&self) -> bool {
        !*self.open.lock().unwrap()
    }

    fn is_shared(&self) -> bool {
        true
    }
}

impl EventChannel for FalseChannel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn never_ready_until_closed() {
        let c = FalseChannel::new();
        assert!(!c.poll());
        c.close();
        assert!(c.poll());
    }

    #[test]
    fn close_wakes_a_waiting_thread() {
        let c = Arc::new(FalseChannel::new());
        let c2 = Arc::clone(&c);
        let handle = thread::spawn(move || c2.wait_for(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(50));
        c.close();
        assert!(handle.join().unwrap());
    }
}
