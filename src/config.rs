//! Tunables for the dispatcher and thread pool, collected here rather than
//! scattered across their constructors so a caller can see every knob at a
//! glance.

use std::time::Duration;

/// Sync-mode sweep backoff bounds for [`crate::dispatch::Dispatcher`]: the
/// sweep starts polling at `min_interval` and doubles, capped at
/// `max_interval`, whenever a full sweep finds nothing ready.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            min_interval: Duration::from_micros(1),
            max_interval: Duration::from_millis(1),
        }
    }
}

/// Tunables for [`crate::thread_pool::ThreadPool`].
#[derive(Debug, Clone, Copy)]
pub struct ThreadPoolConfig {
    /// Worker thread count; `0` resolves to [`std::thread::available_parallelism`].
    pub threads: usize,
    /// How long an idle worker sleeps between failed steal attempts.
    pub steal_retry_delay: Duration,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        ThreadPoolConfig { threads: 0, steal_retry_delay: Duration::from_millis(1) }
    }
}

/// Listen backlog used by [`crate::net::tcp::TcpServer::bind`].
pub const TCP_LISTEN_BACKLOG: i32 = 10;

/// Default read-buffer size for [`crate::channel::StreamChannel`] implementors.
pub const DEFAULT_STREAM_BUFFER: usize = 16384;

/// Retry delay used by the blocking socket write loop when a write would
/// block.
pub const SOCKET_WRITE_RETRY_DELAY: Duration = Duration::from_micros(10);
