//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`CoreResult<T>`] rather
//! than panicking or throwing; the single exception is genuine programmer
//! error (a poisoned internal mutex), which is still allowed to panic since
//! recovering from it would hide a prior panic on another thread.

use std::io;

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

/// The taxonomy of failures a caller can observe.
///
/// `InvalidArgument`, `Closed` and `Empty` are recoverable conditions a
/// caller is expected to branch on; `System` wraps an OS-level failure
/// (`errno`); `Handler` carries an error returned by a user-supplied
/// dispatch callback back to the caller of [`crate::dispatch::Dispatcher::run`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("system error during {op}: {source}")]
    System { op: &'static str, source: io::Error },

    #[error("handler error: {0}")]
    Handler(Box<CoreError>),

    #[error("channel closed")]
    Closed,

    #[error("channel empty")]
    Empty,
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        CoreError::InvalidArgument(msg.into())
    }

    pub fn system(op: &'static str, source: io::Error) -> Self {
        CoreError::System { op, source }
    }

    /// Builds a [`CoreError::System`] from the current thread's `errno`.
    pub fn last_os_error(op: &'static str) -> Self {
        CoreError::System { op, source: io::Error::last_os_error() }
    }
}
