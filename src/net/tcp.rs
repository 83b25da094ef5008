use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket as RawSocket, Type};
use tracing::{info, warn};

use super::socket::{socket_ready_now, socket_wait_for, write_loop, NetChannel};
use crate::channel::{Channel, MessageChannel, StreamChannel};
use crate::config::TCP_LISTEN_BACKLOG;
use crate::error::CoreError;
use crate::wait::Wait;

/// A connected TCP socket. Non-blocking and Nagle-disabled from the moment
/// [`TcpClient::connect`] returns (Nagle delays small writes to coalesce
/// them, which fights the channel model's "write now, read when ready"
/// pattern).
pub struct TcpClient {
    stream: TcpStream,
    closed: AtomicBool,
}

impl TcpClient {
    pub fn connect(remote: SocketAddr, local: Option<SocketAddr>) -> Result<Self, CoreError> {
        let domain = if remote.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let raw = RawSocket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| CoreError::system("socket", e))?;
        if let Some(local) = local {
            raw.bind(&local.into()).map_err(|e| CoreError::system("bind", e))?;
        }
        raw.connect(&remote.into()).map_err(|e| CoreError::system("connect", e))?;
        raw.set_nonblocking(true).map_err(|e| CoreError::system("set_nonblocking", e))?;
        raw.set_nodelay(true).map_err(|e| CoreError::system("set_nodelay", e))?;
        info!(%remote, "tcp connect");
        Ok(TcpClient { stream: raw.into(), closed: AtomicBool::new(false) })
    }

    pub(super) fn from_accepted(stream: TcpStream) -> Result<Self, CoreError> {
        stream.set_nonblocking(true).map_err(|e| CoreError::system("set_nonblocking", e))?;
        stream.set_nodelay(true).map_err(|e| CoreError::system("set_nodelay", e))?;
        if let Ok(peer) = stream.peer_addr() {
            info!(%peer, "tcp accept");
        }
        Ok(TcpClient { stream, closed: AtomicBool::new(false) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        self.stream.local_addr().map_err(|e| CoreError::system("local_addr", e))
    }

    pub fn remote_addr(&self) -> Result<SocketAddr, CoreError> {
        self.stream.peer_addr().map_err(|e| CoreError::system("peer_addr", e))
    }

    /// Writes all of `data`, blocking (with short retries) until every byte
    /// is accepted by the kernel send buffer. Returns `false` if the
    /// channel was already closed or the underlying write failed.
    pub fn write(&self, data: &[u8]) -> bool {
        use std::io::Write;
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        let mut stream = &self.stream;
        write_loop(data, |chunk| stream.write(chunk))
    }
}

impl Wait for TcpClient {
    fn wait_for(&self, timeout: Duration) -> bool {
        socket_wait_for(self.stream.as_raw_fd(), &self.closed, timeout)
    }
}

impl Channel for TcpClient {
    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl StreamChannel for TcpClient {
    fn read(&self, dst: &mut [u8]) -> usize {
        use std::io::Read;
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        if !socket_ready_now(self.stream.as_raw_fd()) {
            return 0;
        }
        let mut stream = &self.stream;
        match stream.read(dst) {
            Ok(0) => {
                self.close();
                0
            }
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    fn buffer_size(&self) -> usize {
        Self::DEFAULT_BUFFER
    }

    fn set_buffer_size(&self, _n: usize) {}
}

impl NetChannel for TcpClient {
    fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

/// A listening TCP socket, yielding accepted connections as [`TcpClient`]s
/// through [`MessageChannel::read`].
pub struct TcpServer {
    listener: TcpListener,
    closed: AtomicBool,
}

impl TcpServer {
    pub fn bind(local: SocketAddr) -> Result<Self, CoreError> {
        let domain = if local.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let raw = RawSocket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| CoreError::system("socket", e))?;
        raw.set_reuse_address(true).map_err(|e| CoreError::system("set_reuse_address", e))?;
        raw.bind(&local.into()).map_err(|e| CoreError::system("bind", e))?;
        raw.set_nonblocking(true).map_err(|e| CoreError::system("set_nonblocking", e))?;
        raw.listen(TCP_LISTEN_BACKLOG).map_err(|e| CoreError::system("listen", e))?;
        Ok(TcpServer { listener: raw.into(), closed: AtomicBool::new(false) })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        self.listener.local_addr().map_err(|e| CoreError::system("local_addr", e))
    }
}

impl Wait for TcpServer {
    fn wait_for(&self, timeout: Duration) -> bool {
        socket_wait_for(self.listener.as_raw_fd(), &self.closed, timeout)
    }
}

impl Channel for TcpServer {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl MessageChannel<TcpClient> for TcpServer {
    fn read(&self) -> Option<TcpClient> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        if !socket_ready_now(self.listener.as_raw_fd()) {
            return None;
        }
        let (stream, _addr) = self.listener.accept().ok()?;
        TcpClient::from_accepted(stream).ok()
    }
}

impl NetChannel for TcpServer {
    fn raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
    }

    #[test]
    fn connect_accept_and_exchange_bytes() {
        let server = TcpServer::bind(loopback(0)).expect("bind");
        let addr = server.local_addr().unwrap();

        let client = TcpClient::connect(addr, None).expect("connect");

        let mut accepted = None;
        for _ in 0..200 {
            if let Some(c) = server.read() {
                accepted = Some(c);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let accepted = accepted.expect("server accepted a connection");

        assert!(client.write(b"ping"));
        let mut buf = [0u8; 16];
        let mut n = 0;
        for _ in 0..200 {
            n = accepted.read(&mut buf);
            if n > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn close_is_idempotent_and_reflected_in_is_closed() {
        let server = TcpServer::bind(loopback(0)).expect("bind");
        let addr = server.local_addr().unwrap();
        let client = TcpClient::connect(addr, None).expect("connect");
        assert!(!client.is_closed());
        client.close();
        client.close();
        assert!(client.is_closed());
    }
}
