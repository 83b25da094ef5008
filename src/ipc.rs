//! A cross-process named mutex, keyed by a human-readable name rather than
//! a filesystem path the caller has to manage.
//!
//! The name is hashed ([`crate::digest::sha256_hex`]) and hex-encoded into a
//! POSIX named-semaphore path so two unrelated processes that agree on the
//! same string get the same semaphore without either of them picking a
//! path. This is not a general IPC layer -- just the one primitive the spec
//! calls out, layered directly on `sem_open`/`sem_wait`/`sem_post`.

use std::time::Duration;

use crate::digest::sha256_hex;
use crate::error::CoreError;

#[cfg(unix)]
pub use unix::NamedMutex;

#[cfg(not(unix))]
pub use inert::NamedMutex;

/// macOS's `sem_open` rejects names longer than `PSEMNAMLEN` (31 bytes,
/// including the leading slash); Linux's limit is `NAME_MAX`-ish and far
/// more generous. Mirrors the original's `__APPLE__`-gated truncation.
fn semaphore_path(name: &str) -> String {
    let hex = sha256_hex(name.as_bytes());
    let limit: usize = if cfg!(target_os = "macos") { 30 } else { 200 };
    format!("/{}", &hex[..limit.min(hex.len())])
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::ffi::CString;

    /// A named semaphore used as a binary mutex. Two `NamedMutex`es
    /// constructed with the same `name` (in the same process or different
    /// ones) contend for the same underlying semaphore.
    pub struct NamedMutex {
        sem: *mut libc::sem_t,
        path: String,
    }

    // Safety: `sem_t` operations are thread-safe and process-safe by design;
    // the pointer is never accessed except through the sem_* family.
    unsafe impl Send for NamedMutex {}
    unsafe impl Sync for NamedMutex {}

    impl NamedMutex {
        /// Opens (creating if absent, initial count 1) the named semaphore
        /// derived from `name`.
        pub fn new(name: &str) -> Result<Self, CoreError> {
            let path = semaphore_path(name);
            let cpath = CString::new(path.clone())
                .map_err(|_| CoreError::invalid_argument("mutex name contains a NUL byte"))?;
            let sem = unsafe {
                libc::sem_open(cpath.as_ptr(), libc::O_CREAT, 0o644 as libc::mode_t, 1u32)
            };
            if sem == libc::SEM_FAILED {
                return Err(CoreError::last_os_error("sem_open"));
            }
            Ok(NamedMutex { sem, path })
        }

        /// The derived semaphore path, exposed for diagnostics.
        pub fn path(&self) -> &str {
            &self.path
        }

        /// Blocks until the mutex is acquired.
        pub fn lock(&self) -> Result<(), CoreError> {
            let rc = unsafe { libc::sem_wait(self.sem) };
            if rc != 0 {
                return Err(CoreError::last_os_error("sem_wait"));
            }
            Ok(())
        }

        /// Attempts to acquire without blocking; `Ok(false)` means it's
        /// already held elsewhere.
        pub fn try_lock(&self) -> Result<bool, CoreError> {
            let rc = unsafe { libc::sem_trywait(self.sem) };
            if rc == 0 {
                return Ok(true);
            }
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EAGAIN) {
                return Ok(false);
            }
            Err(CoreError::system("sem_trywait", err))
        }

        /// Attempts to acquire, blocking at most `timeout`.
        #[cfg(target_os = "linux")]
        pub fn try_lock_for(&self, timeout: Duration) -> Result<bool, CoreError> {
            let deadline = now_plus(timeout);
            let rc = unsafe { libc::sem_timedwait(self.sem, &deadline) };
            if rc == 0 {
                return Ok(true);
            }
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ETIMEDOUT) {
                return Ok(false);
            }
            Err(CoreError::system("sem_timedwait", err))
        }

        /// Attempts to acquire, blocking at most `timeout`. macOS has no
        /// `sem_timedwait`; polls `sem_trywait` with a capped backoff
        /// instead, mirroring the original's `__APPLE__` branch.
        #[cfg(not(target_os = "linux"))]
        pub fn try_lock_for(&self, timeout: Duration) -> Result<bool, CoreError> {
            let start = std::time::Instant::now();
            let mut backoff = Duration::from_millis(1);
            loop {
                if self.try_lock()? {
                    return Ok(true);
                }
                if start.elapsed() >= timeout {
                    return Ok(false);
                }
                std::thread::sleep(backoff.min(timeout.saturating_sub(start.elapsed())));
                backoff = (backoff * 2).min(Duration::from_millis(10));
            }
        }

        /// Releases the mutex.
        pub fn unlock(&self) -> Result<(), CoreError> {
            let rc = unsafe { libc::sem_post(self.sem) };
            if rc != 0 {
                return Err(CoreError::last_os_error("sem_post"));
            }
            Ok(())
        }
    }

    #[cfg(target_os = "linux")]
    fn now_plus(d: Duration) -> libc::timespec {
        let mut now = libc::timespec { tv_sec: 0, tv_nsec: 0 };
        unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };
        let mut nsec = now.tv_nsec + d.subsec_nanos() as i64;
        let mut sec = now.tv_sec + d.as_secs() as libc::time_t;
        if nsec >= 1_000_000_000 {
            nsec -= 1_000_000_000;
            sec += 1;
        }
        libc::timespec { tv_sec: sec, tv_nsec: nsec }
    }

    impl Drop for NamedMutex {
        fn drop(&mut self) {
            unsafe {
                libc::sem_close(self.sem);
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serial_test::serial;

        #[test]
        #[serial]
        fn lock_and_unlock_round_trip() {
            let m = NamedMutex::new("waitcore-ipc-test-basic").expect("open semaphore");
            m.lock().expect("lock");
            m.unlock().expect("unlock");
        }

        #[test]
        #[serial]
        fn try_lock_fails_while_held() {
            let m = NamedMutex::new("waitcore-ipc-test-trylock").expect("open semaphore");
            m.lock().expect("lock");
            assert!(!m.try_lock().expect("try_lock"));
            m.unlock().expect("unlock");
            assert!(m.try_lock().expect("try_lock after unlock"));
            m.unlock().expect("unlock");
        }

        #[test]
        #[serial]
        fn try_lock_for_times_out() {
            let m = NamedMutex::new("waitcore-ipc-test-timeout").expect("open semaphore");
            m.lock().expect("lock");
            assert!(!m.try_lock_for(Duration::from_millis(20)).expect("try_lock_for"));
            m.unlock().expect("unlock");
        }
    }
}

#[cfg(not(unix))]
mod inert {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Non-Unix fallback: a process-local flag only, not cross-process.
    /// Present so the crate compiles everywhere; documented as degraded.
    /// Unlike the POSIX implementation this does not block a contending
    /// thread -- [`NamedMutex::lock`] simply spins with a short sleep.
    pub struct NamedMutex {
        held: AtomicBool,
        path: String,
    }

    impl NamedMutex {
        pub fn new(name: &str) -> Result<Self, CoreError> {
            Ok(NamedMutex { held: AtomicBool::new(false), path: semaphore_path(name) })
        }

        pub fn path(&self) -> &str {
            &self.path
        }

        pub fn lock(&self) -> Result<(), CoreError> {
            while self.held.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }

        pub fn try_lock(&self) -> Result<bool, CoreError> {
            Ok(self.held.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok())
        }

        pub fn try_lock_for(&self, timeout: Duration) -> Result<bool, CoreError> {
            let start = std::time::Instant::now();
            loop {
                if self.try_lock()? {
                    return Ok(true);
                }
                if start.elapsed() >= timeout {
                    return Ok(false);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        pub fn unlock(&self) -> Result<(), CoreError> {
            self.held.store(false, Ordering::Release);
            Ok(())
        }
    }
}
