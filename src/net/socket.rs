//! Shared readiness/write-loop plumbing used by every concrete socket
//! channel.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::channel::Channel;
use crate::config::SOCKET_WRITE_RETRY_DELAY;

/// A socket channel that can report its native descriptor, so
/// [`super::SocketSet`] can multiplex across heterogeneous socket types.
pub trait NetChannel: Channel {
    fn raw_fd(&self) -> RawFd;
}

pub(super) enum PollOutcome {
    Ready(usize),
    Timeout,
    /// `poll(2)` itself failed (e.g. a descriptor became invalid); treated
    /// the same as the original implementation treats a `-1` return from
    /// `select`: the socket is considered closed.
    Invalid,
}

/// Polls `fds` for readability, returning the first ready index in
/// registration order (entries with a negative fd are ignored by `poll(2)`
/// and used as the "closed" sentinel).
pub(super) fn poll_fds(fds: &[RawFd], timeout: Option<Duration>) -> PollOutcome {
    if fds.is_empty() {
        if let Some(t) = timeout {
            thread::sleep(t);
        }
        return PollOutcome::Timeout;
    }
    let mut pollfds: Vec<libc::pollfd> =
        fds.iter().map(|&fd| libc::pollfd { fd, events: libc::POLLIN, revents: 0 }).collect();
    let timeout_ms: i32 = match timeout {
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
        None => -1,
    };
    let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
    if rc == 0 {
        return PollOutcome::Timeout;
    }
    if rc < 0 {
        return PollOutcome::Invalid;
    }
    for (i, pfd) in pollfds.iter().enumerate() {
        if pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
            return PollOutcome::Ready(i);
        }
    }
    PollOutcome::Timeout
}

/// Readiness check for a single socket, folding the "closed" outcome into
/// `true` (consistent with [`crate::wait::Wait`]'s contract that `wait_for`
/// reports whether the condition -- here, "readable or dead" -- became
/// true).
pub(super) fn socket_wait_for(fd: RawFd, closed: &AtomicBool, timeout: Duration) -> bool {
    if closed.load(Ordering::Acquire) {
        return true;
    }
    match poll_fds(&[fd], Some(timeout)) {
        PollOutcome::Ready(_) => true,
        PollOutcome::Timeout => false,
        PollOutcome::Invalid => {
            closed.store(true, Ordering::Release);
            true
        }
    }
}

/// Single immediate readiness check (used before a non-blocking `recv`/
/// `accept` so we don't surface a spurious `WouldBlock` as "closed").
pub(super) fn socket_ready_now(fd: RawFd) -> bool {
    matches!(poll_fds(&[fd], Some(Duration::ZERO)), PollOutcome::Ready(_))
}

/// Writes all of `data` via `send_once`, retrying on `WouldBlock` with a
/// short sleep. Returns `false` only if `send_once` reports a real error.
pub(super) fn write_loop(
    data: &[u8],
    mut send_once: impl FnMut(&[u8]) -> io::Result<usize>,
) -> bool {
    let mut written = 0;
    while written < data.len() {
        match send_once(&data[written..]) {
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(SOCKET_WRITE_RETRY_DELAY);
            }
            Err(_) => return false,
        }
    }
    true
}
