use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{Channel, MessageChannel};
use crate::wait::Wait;

#[derive(PartialEq)]
enum Status {
    NoChange,
    New,
    Closed,
}

struct ValueState<T> {
    value: T,
    status: Status,
}

/// Holds the latest value written to it. Writes that are equal (by
/// `PartialEq`) to the current value are coalesced and do not count as a
/// new fire -- a consumer sees state changes, not every write. Wrap values
/// in a monotonic sequence number if "every write is an event" semantics
/// are needed instead.
pub struct ValueChannel<T> {
    inner: Mutex<ValueState<T>>,
    cv: Condvar,
}

impl<T: Default> Default for ValueChannel<T> {
    fn default() -> Self {
        Self::with_value(T::default())
    }
}

impl<T> ValueChannel<T> {
    pub fn with_value(value: T) -> Self {
        ValueChannel { inner: Mutex::new(ValueState { value, status: Status::NoChange }), cv: Condvar::new() }
    }

    /// Discards a pending "new value" state without consuming the value.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.status == Status::New {
            guard.status = Status::NoChange;
        }
    }
}

impl<T: PartialEq> ValueChannel<T> {
    /// Writes `value`. Returns `false` (without storing) if the channel is
    /// closed. Writing a value equal to the current one is a no-op that
    /// still returns `true`.
    pub fn write(&self, value: T) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if guard.status == Status::Closed {
            return false;
        }
        if guard.value == value {
            return true;
        }
        guard.value = value;
        guard.status = Status::New;
        self.cv.notify_all();
        true
    }
}

impl<T: Send> Wait for ValueChannel<T> {
    fn wait_for(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock().unwrap();
        if guard.status != Status::NoChange {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |s| s.status == Status::NoChange)
            .unwrap();
        guard.status != Status::NoChange
    }
}

impl<T: Send + Sync + 'static> Channel for ValueChannel<T> {
    fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.status = Status::Closed;
        self.cv.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().status == Status::Closed
    }

    fn is_shared(&self) -> bool {
        true
    }
}

impl<T: Clone + Send + Sync + 'static> MessageChannel<T> for ValueChannel<T> {
    fn read(&self) -> Option<T> {
        let mut guard = self.inner.lock().unwrap();
        if guard.status != Status::New {
            return None;
        }
        guard.status = Status::NoChange;
        Some(guard.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_writes_are_coalesced() {
        let v = ValueChannel::with_value(0);
        assert!(v.write(1));
        assert!(v.write(1));
        assert_eq!(v.read(), Some(1));
        assert_eq!(v.read(), None);
    }

    #[test]
    fn close_rejects_further_writes() {
        let v = ValueChannel::with_value(0);
        v.close();
        assert!(!v.write(1));
        assert!(v.is_closed());
    }
}
