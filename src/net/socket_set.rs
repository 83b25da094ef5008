//! Multiplexes an arbitrary collection of [`NetChannel`]s behind a single
//! [`crate::wait::Wait`]/[`MessageChannel`] pair, so a dispatcher task can
//! watch many sockets of different concrete types with one registration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::socket::{poll_fds, PollOutcome};
use super::NetChannel;
use crate::channel::{Channel, MessageChannel};
use crate::wait::Wait;

/// A dynamic set of sockets, polled together. Sockets are added with
/// [`SocketSet::register`] and removed with [`SocketSet::unregister`]; a
/// socket that closes itself is skipped on the next poll and dropped from
/// the set.
pub struct SocketSet {
    entries: Mutex<Vec<Arc<dyn NetChannel>>>,
    ready: Mutex<Option<usize>>,
    open: AtomicBool,
}

impl SocketSet {
    pub fn new() -> Self {
        SocketSet { entries: Mutex::new(Vec::new()), ready: Mutex::new(None), open: AtomicBool::new(true) }
    }

    pub fn register(&self, socket: Arc<dyn NetChannel>) {
        self.entries.lock().unwrap().push(socket);
    }

    /// Drops every entry whose `raw_fd` matches `fd`, if present.
    pub fn unregister(&self, fd: std::os::unix::io::RawFd) {
        self.entries.lock().unwrap().retain(|s| s.raw_fd() != fd);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One poll pass: drops closed entries, returns the index (within the
    /// post-prune list) of the first ready entry, if any.
    fn scan(&self, timeout: Option<Duration>) -> Option<usize> {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|s| !s.is_closed());
        if entries.is_empty() {
            return None;
        }
        let fds: Vec<_> = entries.iter().map(|s| s.raw_fd()).collect();
        match poll_fds(&fds, timeout) {
            PollOutcome::Ready(i) => Some(i),
            PollOutcome::Timeout => None,
            PollOutcome::Invalid => None,
        }
    }
}

impl Default for SocketSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wait for SocketSet {
    fn wait_for(&self, timeout: Duration) -> bool {
        if !self.open.load(Ordering::Acquire) {
            return true;
        }
        match self.scan(Some(timeout)) {
            Some(i) => {
                *self.ready.lock().unwrap() = Some(i);
                true
            }
            None => false,
        }
    }
}

impl Channel for SocketSet {
    fn close(&self) {
        self.open.store(false, Ordering::Release);
        for s in self.entries.lock().unwrap().iter() {
            s.close();
        }
    }

    fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire) && self.is_empty()
    }
}

impl MessageChannel<Arc<dyn NetChannel>> for SocketSet {
    /// Returns the socket found ready by the most recent `wait_for`, if it's
    /// still in the set; otherwise does an immediate zero-timeout scan.
    fn read(&self) -> Option<Arc<dyn NetChannel>> {
        let idx = self.ready.lock().unwrap().take().or_else(|| self.scan(Some(Duration::ZERO)))?;
        self.entries.lock().unwrap().get(idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{TcpClient, TcpServer};
    use std::net::{Ipv4Addr, SocketAddr};

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
    }

    #[test]
    fn finds_the_socket_that_became_readable() {
        let server = TcpServer::bind(loopback(0)).expect("bind");
        let addr = server.local_addr().unwrap();
        let client = TcpClient::connect(addr, None).expect("connect");

        let set = SocketSet::new();
        set.register(Arc::new(server));

        let mut accepted_once = false;
        for _ in 0..200 {
            if set.wait_for(Duration::from_millis(5)) {
                accepted_once = true;
                break;
            }
        }
        assert!(accepted_once, "server socket became readable (pending accept)");
        assert!(set.read().is_some());
        drop(client);
    }

    #[test]
    fn unregister_removes_a_socket_by_fd() {
        let server = TcpServer::bind(loopback(0)).expect("bind");
        let fd = {
            use std::os::unix::io::AsRawFd;
            server.local_addr().is_ok();
            std::net::TcpListener::bind(loopback(0)).unwrap().as_raw_fd()
        };
        let set = SocketSet::new();
        set.register(Arc::new(server));
        assert_eq!(set.len(), 1);
        // fd above belongs to a throwaway listener, not `server`'s; this just
        // exercises that an unmatched fd is a no-op.
        set.unregister(fd);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn close_closes_every_registered_socket() {
        let server = TcpServer::bind(loopback(0)).expect("bind");
        let set = SocketSet::new();
        set.register(Arc::new(server));
        set.close();
        assert!(set.is_closed());
    }
}
