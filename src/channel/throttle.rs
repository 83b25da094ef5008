use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{Channel, EventChannel};
use crate::wait::Wait;

struct ThrottleState {
    next: Option<Instant>,
    open: bool,
}

/// Fires at most once per `period`, same as [`super::TimerChannel`], except
/// it never accumulates a backlog: if more than one period elapses between
/// checks, only a single fire is produced and the next deadline is measured
/// from "now", not from the missed ticks. Good for rate-limiting a noisy
/// producer rather than for a regular clock.
pub struct ThrottleChannel {
    inner: Mutex<ThrottleState>,
    cv: Condvar,
    period: Duration,
}

impl ThrottleChannel {
    pub fn new(period: Duration) -> Self {
        ThrottleChannel {
            inner: Mutex::new(ThrottleState { next: None, open: true }),
            cv: Condvar::new(),
            period,
        }
    }
}

impl Wait for ThrottleChannel {
    fn wait_for(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if !guard.open {
            return true;
        }
        let now = Instant::now();
        let ready = match guard.next {
            None => true,
            Some(n) => n <= now,
        };
        if ready {
            guard.next = Some(now + self.period);
            return true;
        }
        let deadline = guard.next.unwrap();
        if timeout.is_zero() {
            return false;
        }
        let remaining = deadline - now;
        let wait_span = timeout.min(remaining);
        let (mut guard, _) =
            self.cv.wait_timeout_while(guard, wait_span, |s| s.open).unwrap();
        if !guard.open {
            return true;
        }
        if wait_span < timeout && Instant::now() >= deadline {
            guard.next = Some(Instant::now() + self.period);
            return true;
        }
        false
    }
}

impl Channel for ThrottleChannel {
    fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.open = false;
        self.cv.notify_all();
    }

    fn is_closed(&self) -> bool {
        !self.inner.lock().unwrap().open
    }

    fn is_shared(&self) -> bool {
        true
    }
}

impl EventChannel for ThrottleChannel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_immediately_the_first_time() {
        let t = ThrottleChannel::new(Duration::from_millis(50));
        assert!(t.poll());
    }

    #[test]
    fn throttles_subsequent_fires() {
        let t = ThrottleChannel::new(Duration::from_millis(50));
        assert!(t.poll());
        assert!(!t.poll());
        assert!(t.wait_for(Duration::from_millis(200)));
    }

    #[test]
    fn does_not_accumulate_a_backlog() {
        let t = ThrottleChannel::new(Duration::from_millis(5));
        assert!(t.poll());
        std::thread::sleep(Duration::from_millis(60));
        assert!(t.poll());
        assert!(!t.poll());
    }
}
