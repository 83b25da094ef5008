use std::sync::Mutex;
use std::time::Duration;

use super::{Channel, MessageChannel};
use crate::wait::Wait;

/// Wraps a producer closure as a message channel. The channel closes itself
/// the first time the closure returns `None`; it is never reopened.
pub struct GeneratorChannel<T> {
    generator: Mutex<Option<Box<dyn FnMut() -> Option<T> + Send>>>,
}

impl<T> GeneratorChannel<T> {
    pub fn new<F>(generator: F) -> Self
    where
        F: FnMut() -> Option<T> + Send + 'static,
    {
        GeneratorChannel { generator: Mutex::new(Some(Box::new(generator))) }
    }
}

impl<T> Wait for GeneratorChannel<T> {
    fn wait_for(&self, _timeout: Duration) -> bool {
        true
    }
}

impl<T: Send + Sync> Channel for GeneratorChannel<T> {
    fn close(&self) {
        *self.generator.lock().unwrap() = None;
    }

    fn is_closed(&self) -> bool {
        self.generator.lock().unwrap().is_none()
    }
}

impl<T: Send + Sync> MessageChannel<T> for GeneratorChannel<T> {
    fn read(&self) -> Option<T> {
        let mut guard = self.generator.lock().unwrap();
        let closed = match guard.as_mut() {
            Some(f) => match f() {
                Some(v) => return Some(v),
                None => true,
            },
            None => return None,
        };
        if closed {
            *guard = None;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_values_then_closes() {
        let mut n = 0;
        let gen = GeneratorChannel::new(move || {
            n += 1;
            if n <= 3 {
                Some(n)
            } else {
                None
            }
        });
        assert_eq!(gen.read(), Some(1));
        assert_eq!(gen.read(), Some(2));
        assert_eq!(gen.read(), Some(3));
        assert_eq!(gen.read(), None);
        assert!(gen.is_closed());
    }

    #[test]
    fn explicit_close_stops_further_reads() {
        let gen = GeneratorChannel::new(|| Some(1));
        gen.close();
        assert_eq!(gen.read(), None);
    }
}
