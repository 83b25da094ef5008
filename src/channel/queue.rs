use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{Channel, MessageChannel};
use crate::wait::Wait;

struct QueueState<T> {
    queue: VecDeque<T>,
    open: bool,
}

/// A multi-producer, multi-consumer FIFO. Writing after [`QueueChannel::close`]
/// fails; reading continues to drain whatever was queued before close.
pub struct QueueChannel<T> {
    inner: Mutex<QueueState<T>>,
    cv: Condvar,
}

impl<T> Default for QueueChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueueChannel<T> {
    pub fn new() -> Self {
        QueueChannel { inner: Mutex::new(QueueState { queue: VecDeque::new(), open: true }), cv: Condvar::new() }
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().queue.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `value`; returns `false` without enqueuing if the channel is
    /// already closed.
    pub fn write(&self, value: T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if !guard.open {
            return false;
        }
        guard.queue.push_back(value);
        self.cv.notify_all();
        true
    }
}

impl<T: Send> Wait for QueueChannel<T> {
    fn wait_for(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock().unwrap();
        if !guard.open || !guard.queue.is_empty() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |s| s.open && s.queue.is_empty())
            .unwrap();
        !guard.open || !guard.queue.is_empty()
    }
}

impl<T: Send + Sync + 'static> Channel for QueueChannel<T> {
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

impl<T: Send + Sync + 'static> MessageChannel<T> for QueueChannel<T> {
    fn read(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        let value = guard.queue.pop_front();
        if value.is_some() && !guard.queue.is_empty() {
            self.cv.notify_all();
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_ordering() {
        let q = QueueChannel::new();
        q.write(1);
        q.write(2);
        q.write(3);
        assert_eq!(q.read(), Some(1));
        assert_eq!(q.read(), Some(2));
        assert_eq!(q.read(), Some(3));
        assert_eq!(q.read(), None);
    }

    #[test]
    fn write_after_close_is_rejected_but_drain_continues() {
        let q = QueueChannel::new();
        q.write(1);
        q.close();
        assert!(!q.write(2));
        assert_eq!(q.read(), Some(1));
        assert_eq!(q.read(), None);
    }

    #[test]
    fn wakes_a_blocked_reader() {
        let q = Arc::new(QueueChannel::new());
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || {
            q2.wait_for(Duration::from_secs(5));
            q2.read()
        });
        thread::sleep(Duration::from_millis(50));
        q.write(99);
        assert_eq!(handle.join().unwrap(), Some(99));
    }
}
