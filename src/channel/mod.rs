//! The channel capability hierarchy: every waitable thing in this crate is a
//! [`Channel`], and most channels additionally implement exactly one of
//! [`EventChannel`] (fires with no payload), [`MessageChannel<T>`] (fires
//! with a discrete value) or [`StreamChannel`] (fires with a byte run).
//!
//! A type implementing more than one of the three capability traits is not
//! disallowed by the type system, but none of the concrete channels in this
//! crate do so -- [`crate::net::tcp::TcpServer`] looks like it should be
//! both a message channel (it yields `TcpClient`s) and a stream channel, but
//! it is only ever used as the former.

mod buffer;
mod false_channel;
mod generator;
mod queue;
mod throttle;
mod timer;
mod true_channel;
mod value;

pub use buffer::BufferChannel;
pub use false_channel::FalseChannel;
pub use generator::GeneratorChannel;
pub use queue::QueueChannel;
pub use throttle::ThrottleChannel;
pub use timer::TimerChannel;
pub use true_channel::TrueChannel;
pub use value::ValueChannel;

use crate::wait::Wait;

/// Common capabilities every channel has regardless of payload shape.
pub trait Channel: Wait + Send + Sync {
    /// Closes the channel. Idempotent: closing an already-closed channel is
    /// a no-op. Closing unblocks any thread currently in `wait_for`.
    fn close(&self);

    /// Whether [`Channel::close`] has been called.
    fn is_closed(&self) -> bool;

    /// Whether more than one registration with a [`crate::dispatch::Dispatcher`]
    /// is legal for this channel. Non-shared channels (almost all of the
    /// concrete ones carrying mutable consumer-side state, such as
    /// [`QueueChannel`]) may only be registered once.
    fn is_shared(&self) -> bool {
        false
    }

    /// Whether the channel may be driven from a dedicated dispatcher worker
    /// thread (`Mode::Async`). The default is `true`; a channel that is not
    /// safe to wait on from an arbitrary thread (see
    /// [`crate::signal::PosixSignal`]) overrides this to `false`.
    fn is_async(&self) -> bool {
        true
    }
}

/// A channel that fires with no payload: readiness alone is the message.
pub trait EventChannel: Channel {}

/// A channel that yields discrete values of type `T`.
pub trait MessageChannel<T>: Channel {
    /// Takes the next available value, or `None` if nothing is ready (the
    /// channel is empty, or closed with nothing left to drain).
    fn read(&self) -> Option<T>;
}

/// A channel that yields a run of bytes.
pub trait StreamChannel: Channel {
    /// Default chunk size used by [`StreamChannel::read_to`].
    const DEFAULT_BUFFER: usize = crate::config::DEFAULT_STREAM_BUFFER;

    /// Reads up to `dst.len()` bytes, returning the number actually read.
    fn read(&self, dst: &mut [u8]) -> usize;

    fn buffer_size(&self) -> usize;
    fn set_buffer_size(&self, n: usize);

    /// Reads one chunk (sized per [`StreamChannel::buffer_size`]) and
    /// appends it to `dst`, returning the number of bytes appended.
    fn read_to(&self, dst: &mut Vec<u8>) -> usize {
        let chunk = self.buffer_size();
        let pos = dst.len();
        dst.resize(pos + chunk, 0);
        let n = self.read(&mut dst[pos..]);
        dst.truncate(pos + n);
        n
    }

    /// Blocks, reading chunks until the channel closes, and returns
    /// everything read. Intended for short-lived streams (test fixtures,
    /// small request bodies); long-lived streams should drive
    /// [`StreamChannel::read_to`] from a [`crate::dispatch::Dispatcher`]
    /// instead.
    fn read_all(&self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            if !self.wait_for(std::time::Duration::from_secs(1)) {
                continue;
            }
            self.read_to(&mut out);
            if self.is_closed() {
                break;
            }
        }
        out
    }
}
