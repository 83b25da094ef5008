use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{Channel, StreamChannel};
use crate::wait::Wait;

struct BufState {
    buf: Vec<u8>,
    offset: usize,
    open: bool,
}

/// An in-memory byte-stream channel: one side [`BufferChannel::write`]s,
/// the other drains it through [`StreamChannel::read`]. The backing buffer
/// is compacted (bytes already consumed are dropped) whenever the consumed
/// prefix reaches half the buffer's length, so a long-lived producer/
/// consumer pair doesn't grow the allocation without bound.
pub struct BufferChannel {
    inner: Mutex<BufState>,
    cv: Condvar,
    buffer_size: AtomicUsize,
}

impl Default for BufferChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferChannel {
    pub fn new() -> Self {
        BufferChannel {
            inner: Mutex::new(BufState { buf: Vec::new(), offset: 0, open: true }),
            cv: Condvar::new(),
            buffer_size: AtomicUsize::new(Self::DEFAULT_BUFFER),
        }
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.buf.clear();
        guard.offset = 0;
    }

    /// Appends `src`. Returns `false` without appending if already closed.
    pub fn write(&self, src: &[u8]) -> bool {
        let mut guard = self.inner.lock().unwrap();
        if !guard.open {
            return false;
        }
        guard.buf.extend_from_slice(src);
        self.cv.notify_all();
        true
    }
}

impl Wait for BufferChannel {
    fn wait_for(&self, timeout: Duration) -> bool {
        let guard = self.inner.lock().unwrap();
        if !guard.open || guard.offset < guard.buf.len() {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |s| s.open && s.offset >= s.buf.len())
            .unwrap();
        !guard.open || guard.offset < guard.buf.len()
    }
}

impl Channel for BufferChannel {
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

impl StreamChannel for BufferChannel {
    fn read(&self, dst: &mut [u8]) -> usize {
        if dst.is_empty() {
            return 0;
        }
        let mut guard = self.inner.lock().unwrap();
        let available = guard.buf.len() - guard.offset;
        if available == 0 {
            return 0;
        }
        let n = available.min(dst.len());
        let start = guard.offset;
        dst[..n].copy_from_slice(&guard.buf[start..start + n]);
        guard.offset += n;
        if guard.offset == guard.buf.len() {
            guard.buf.clear();
            guard.offset = 0;
        } else if 2 * guard.offset >= guard.buf.len() {
            guard.buf.drain(0..guard.offset);
            guard.offset = 0;
        }
        n
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size.load(Ordering::Relaxed)
    }

    fn set_buffer_size(&self, n: usize) {
        self.buffer_size.store(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_what_was_written() {
        let c = BufferChannel::new();
        c.write(b"hello ");
        c.write(b"world");
        let mut dst = [0u8; 32];
        let n = c.read(&mut dst);
        assert_eq!(&dst[..n], b"hello world");
    }

    #[test]
    fn partial_reads_preserve_remainder() {
        let c = BufferChannel::new();
        c.write(b"abcdef");
        let mut dst = [0u8; 3];
        assert_eq!(c.read(&mut dst), 3);
        assert_eq!(&dst, b"abc");
        assert_eq!(c.read(&mut dst), 3);
        assert_eq!(&dst, b"def");
        assert_eq!(c.read(&mut dst), 0);
    }

    #[test]
    fn compacts_past_half_consumed() {
        let c = BufferChannel::new();
        c.write(&[1, 2, 3, 4]);
        let mut dst = [0u8; 2];
        c.read(&mut dst);
        {
            let guard = c.inner.lock().unwrap();
            assert_eq!(guard.offset, 0);
            assert_eq!(guard.buf.len(), 2);
        }
    }

    #[test]
    fn closed_channel_rejects_writes() {
        let c = BufferChannel::new();
        c.close();
        assert!(!c.write(b"x"));
        assert!(c.is_closed());
    }
}
