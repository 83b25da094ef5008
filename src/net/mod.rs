//! BSD-socket channel variants built on `std::net`, with socket
//! construction (bind-before-connect, listen backlog, reuse-address)
//! delegated to `socket2` and readiness multiplexing done with `poll(2)`.
//!
//! Unlike the rest of the crate, this module is Unix-only: its readiness
//! primitive and descriptor model are POSIX concepts, and async I/O on
//! Windows beyond readiness polling is an explicit non-goal.

#![cfg(unix)]

mod socket;
mod socket_set;
mod tcp;
mod udp;

pub use socket::NetChannel;
pub use socket_set::SocketSet;
pub use tcp::{TcpClient, TcpServer};
pub use udp::UdpClient;

use std::net::SocketAddr;

use crate::error::CoreError;

/// Parses `a.b.c.d:port` or `[ipv6]:port`. A thin wrapper over
/// [`std::net::SocketAddr`]'s own `FromStr`, kept so callers get a
/// [`CoreError`] instead of the standard library's own parse-error type.
pub fn parse_address(s: &str) -> Result<SocketAddr, CoreError> {
    s.parse()
        .map_err(|_| CoreError::invalid_argument(format!("not a socket address: {s}")))
}
