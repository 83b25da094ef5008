//! Waitable channels, a registration-order dispatcher, BSD-socket channel
//! variants and a work-stealing thread pool, built around a single
//! suspension-point abstraction ([`wait::Wait`]).
//!
//! A small set of peripheral helpers (digest, string case conversion,
//! pluralization, path utilities, a minimal URL parser, ANSI styling, a
//! topological sort and a persistent key/value store) round out the crate;
//! they are deliberately thin and do not participate in the channel model
//! except where noted.

pub mod channel;
pub mod config;
pub mod digest;
pub mod dispatch;
pub mod english;
pub mod error;
pub mod ipc;
pub mod logging;
pub mod net;
pub mod path;
pub mod signal;
pub mod store;
pub mod strings;
pub mod term;
pub mod thread_pool;
pub mod topo_sort;
pub mod url;
pub mod wait;

pub use channel::{Channel, EventChannel, MessageChannel, StreamChannel};
pub use dispatch::{DispatchOutcome, Dispatcher, Mode, Reason};
pub use error::{CoreError, CoreResult};
pub use thread_pool::ThreadPool;
pub use wait::Wait;
