use std::net::{SocketAddr, UdpSocket};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket as RawSocket, Type};

use super::socket::{socket_ready_now, socket_wait_for, write_loop, NetChannel};
use crate::channel::{Channel, StreamChannel};
use crate::error::CoreError;
use crate::wait::Wait;

/// A UDP socket. If constructed with [`UdpClient::connect`], `write`/`read`
/// behave like a connected byte stream; if constructed with
/// [`UdpClient::bind`] (no fixed peer), use [`UdpClient::send_to`] /
/// [`UdpClient::recv_from`] instead.
pub struct UdpClient {
    socket: UdpSocket,
    closed: AtomicBool,
    connected: bool,
}

impl UdpClient {
    pub fn connect(remote: SocketAddr, local: Option<SocketAddr>) -> Result<Self, CoreError> {
        let socket = Self::new_raw(local.unwrap_or_else(|| wildcard_for(&remote)))?;
        socket.connect(remote).map_err(|e| CoreError::system("connect", e))?;
        socket.set_nonblocking(true).map_err(|e| CoreError::system("set_nonblocking", e))?;
        Ok(UdpClient { socket, closed: AtomicBool::new(false), connected: true })
    }

    pub fn bind(local: SocketAddr) -> Result<Self, CoreError> {
        let socket = Self::new_raw(local)?;
        socket.set_nonblocking(true).map_err(|e| CoreError::system("set_nonblocking", e))?;
        Ok(UdpClient { socket, closed: AtomicBool::new(false), connected: false })
    }

    fn new_raw(local: SocketAddr) -> Result<UdpSocket, CoreError> {
        let domain = if local.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let raw = RawSocket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| CoreError::system("socket", e))?;
        raw.bind(&local.into()).map_err(|e| CoreError::system("bind", e))?;
        Ok(raw.into())
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoreError> {
        self.socket.local_addr().map_err(|e| CoreError::system("local_addr", e))
    }

    /// Sends on a connected socket. Panics-free but a no-op (`false`) if
    /// the socket was constructed via [`UdpClient::bind`].
    pub fn write(&self, data: &[u8]) -> bool {
        if self.closed.load(Ordering::Acquire) || !self.connected {
            return false;
        }
        write_loop(data, |chunk| self.socket.send(chunk))
    }

    pub fn send_to(&self, data: &[u8], addr: SocketAddr) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        write_loop(data, |chunk| self.socket.send_to(chunk, addr))
    }

    pub fn recv_from(&self, dst: &mut [u8]) -> Option<(usize, SocketAddr)> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        if !socket_ready_now(self.socket.as_raw_fd()) {
            return None;
        }
        self.socket.recv_from(dst).ok()
    }
}

fn wildcard_for(remote: &SocketAddr) -> SocketAddr {
    if remote.is_ipv4() {
        SocketAddr::new(std::net::Ipv4Addr::UNSPECIFIED.into(), 0)
    } else {
        SocketAddr::new(std::net::Ipv6Addr::UNSPECIFIED.into(), 0)
    }
}

impl Wait for UdpClient {
    fn wait_for(&self, timeout: Duration) -> bool {
        socket_wait_for(self.socket.as_raw_fd(), &self.closed, timeout)
    }
}

impl Channel for UdpClient {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl StreamChannel for UdpClient {
    fn read(&self, dst: &mut [u8]) -> usize {
        if self.closed.load(Ordering::Acquire) || !self.connected {
            return 0;
        }
        if !socket_ready_now(self.socket.as_raw_fd()) {
            return 0;
        }
        self.socket.recv(dst).unwrap_or(0)
    }

    fn buffer_size(&self) -> usize {
        Self::DEFAULT_BUFFER
    }

    fn set_buffer_size(&self, _n: usize) {}
}

impl NetChannel for UdpClient {
    fn raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
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
    fn datagram_exchange_via_send_to_recv_from() {
        let a = UdpClient::bind(loopback(0)).expect("bind a");
        let b = UdpClient::bind(loopback(0)).expect("bind b");
        let b_addr = b.local_addr().unwrap();

        assert!(a.send_to(b"hi", b_addr));

        let mut buf = [0u8; 16];
        let mut result = None;
        for _ in 0..200 {
            if let Some(r) = b.recv_from(&mut buf) {
                result = Some(r);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let (n, _from) = result.expect("datagram arrived");
        assert_eq!(&buf[..n], b"hi");
    }

    #[test]
    fn connected_sockets_exchange_via_stream_interface() {
        // Probe for a free ephemeral port, then release it immediately: UDP
        // sockets (unlike TCP) have no lingering TIME_WAIT state, so the
        // port is free to rebind as soon as the probe is dropped.
        let b_addr = {
            let probe = UdpClient::bind(loopback(0)).expect("bind probe");
            probe.local_addr().unwrap()
        };
        let a = UdpClient::connect(b_addr, None).expect("connect a to b");
        let a_addr = a.local_addr().unwrap();
        let b = UdpClient::connect(a_addr, Some(b_addr)).expect("connect b to a");

        assert!(a.write(b"hello"));
        let mut buf = [0u8; 16];
        let mut n = 0;
        for _ in 0..200 {
            n = b.read(&mut buf);
            if n > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(&buf[..n], b"hello");
    }
}
