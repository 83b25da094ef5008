//! Thin wrapper around [`tracing_subscriber`] initialization.
//!
//! The rest of the crate never calls `tracing_subscriber` directly; it logs
//! through the plain `tracing` macros, leaving subscriber setup to whatever
//! binary embeds this crate. [`init`] is a convenience for tests and small
//! demo binaries that just want sane defaults.

use std::path::Path;

use tracing::level_filters::LevelFilter;

/// Installs a global subscriber that writes to stderr at `level` and above.
/// Safe to call more than once; later calls are a no-op if a subscriber is
/// already installed.
pub fn init(level: LevelFilter) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init();
}

/// Installs a global subscriber that writes to a rolling daily file under
/// `dir`, returning the guard that must be kept alive for the duration of
/// the program (dropping it stops the background flush thread).
pub fn init_to_file(dir: &Path, file_name_prefix: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(dir, file_name_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init();
    guard
}
