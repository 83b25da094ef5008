use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{Channel, EventChannel};
use crate::wait::Wait;

struct TimerState {
    next_tick: Instant,
    open: bool,
}

/// Fires once per `period`, catching up immediately if more than one period
/// has elapsed since the last check (a caller that doesn't poll for a while
/// sees a single fire per call, not one per missed tick, but
/// [`TimerChannel::flush`] lets a caller explicitly discard a backlog of
/// missed ticks without consuming one).
pub struct TimerChannel {
    inner: Mutex<TimerState>,
    cv: Condvar,
    period: Duration,
}

impl TimerChannel {
    pub fn new(period: Duration) -> Self {
        TimerChannel {
            inner: Mutex::new(TimerState { next_tick: Instant::now() + period, open: true }),
            cv: Condvar::new(),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Discards any backlog of elapsed ticks without counting as a fire.
    pub fn flush(&self) {
        let mut guard = self.inner.lock().unwrap();
        if !guard.open {
            return;
        }
        let now = Instant::now();
        if now < guard.next_tick {
            return;
        }
        let period_nanos = self.period.as_nanos().max(1);
        let elapsed = (now - guard.next_tick).as_nanos();
        let skipped = elapsed / period_nanos + 1;
        guard.next_tick += self.period * (skipped as u32);
    }
}

impl Wait for TimerChannel {
    fn wait_for(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if !guard.open {
            return true;
        }
        let now = Instant::now();
        if guard.next_tick <= now {
            guard.next_tick += self.period;
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let remaining = guard.next_tick - now;
        let wait_span = timeout.min(remaining);
        let (mut guard, _) =
            self.cv.wait_timeout_while(guard, wait_span, |s| s.open).unwrap();
        if !guard.open {
            return true;
        }
        if wait_span < timeout && Instant::now() >= guard.next_tick {
            guard.next_tick += self.period;
            return true;
        }
        false
    }
}

impl Channel for TimerChannel {
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

impl EventChannel for TimerChannel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_period() {
        let t = TimerChannel::new(Duration::from_millis(20));
        assert!(!t.poll());
        assert!(t.wait_for(Duration::from_millis(200)));
    }

    #[test]
    fn flush_discards_backlog_without_firing() {
        let t = TimerChannel::new(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(60));
        t.flush();
        assert!(!t.poll());
    }

    #[test]
    fn close_wakes_waiters_immediately() {
        let t = TimerChannel::new(Duration::from_secs(10));
        t.close();
        assert!(t.wait_for(Duration::from_millis(1)));
    }
}
