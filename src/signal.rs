//! A bridge from POSIX signal delivery to the channel model.
//!
//! Constructing a [`PosixSignal`] blocks the requested signals (via
//! `pthread_sigmask`) on the calling thread for the lifetime of the object,
//! plus an auxiliary `SIGUSR1` used purely to interrupt a blocked
//! `sigtimedwait`/`sigwait` when [`PosixSignal::close`] is called. Because
//! the mask is thread-local, the channel is not safe to drive from a
//! dispatcher worker thread other than the one that constructed it --
//! [`Channel::is_async`] returns `false` to reflect this.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::channel::{Channel, MessageChannel};
use crate::error::CoreError;
use crate::wait::Wait;

#[cfg(unix)]
pub use unix::PosixSignal;

#[cfg(not(unix))]
pub use inert::PosixSignal;

/// Best-effort signal-number-to-name mapping for diagnostics.
pub fn name(signal: i32) -> String {
    #[cfg(unix)]
    {
        match signal {
            libc::SIGHUP => "SIGHUP".into(),
            libc::SIGINT => "SIGINT".into(),
            libc::SIGQUIT => "SIGQUIT".into(),
            libc::SIGILL => "SIGILL".into(),
            libc::SIGABRT => "SIGABRT".into(),
            libc::SIGFPE => "SIGFPE".into(),
            libc::SIGKILL => "SIGKILL".into(),
            libc::SIGSEGV => "SIGSEGV".into(),
            libc::SIGPIPE => "SIGPIPE".into(),
            libc::SIGALRM => "SIGALRM".into(),
            libc::SIGTERM => "SIGTERM".into(),
            libc::SIGUSR1 => "SIGUSR1".into(),
            libc::SIGUSR2 => "SIGUSR2".into(),
            libc::SIGCHLD => "SIGCHLD".into(),
            libc::SIGCONT => "SIGCONT".into(),
            libc::SIGSTOP => "SIGSTOP".into(),
            _ => signal.to_string(),
        }
    }
    #[cfg(not(unix))]
    {
        signal.to_string()
    }
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::mem::MaybeUninit;
    use std::os::raw::c_int;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A message channel yielding the signal numbers delivered among those
    /// requested at construction.
    pub struct PosixSignal {
        signals: Vec<c_int>,
        newmask: libc::sigset_t,
        oldmask: libc::sigset_t,
        queue: Mutex<VecDeque<c_int>>,
        open: AtomicBool,
    }

    // Safety: all mutable state is behind a Mutex or an AtomicBool; the
    // sigset_t fields are read-only after construction.
    unsafe impl Send for PosixSignal {}
    unsafe impl Sync for PosixSignal {}

    impl PosixSignal {
        /// Blocks `signals` (plus the internal wake signal) on the calling
        /// thread. Must be constructed on the thread that will call
        /// `read`/`wait_for`.
        pub fn new(signals: Vec<i32>) -> Result<Self, CoreError> {
            let mut all = signals.clone();
            all.push(libc::SIGUSR1);

            let mut newmask = unsafe { MaybeUninit::<libc::sigset_t>::zeroed().assume_init() };
            unsafe {
                libc::sigemptyset(&mut newmask);
                for &s in &all {
                    libc::sigaddset(&mut newmask, s);
                }
            }
            let mut oldmask = unsafe { MaybeUninit::<libc::sigset_t>::zeroed().assume_init() };
            let rc = unsafe {
                libc::pthread_sigmask(libc::SIG_BLOCK, &newmask, &mut oldmask)
            };
            if rc != 0 {
                return Err(CoreError::last_os_error("pthread_sigmask"));
            }

            Ok(PosixSignal {
                signals,
                newmask,
                oldmask,
                queue: Mutex::new(VecDeque::new()),
                open: AtomicBool::new(true),
            })
        }

        fn is_member(&self, signal: c_int) -> bool {
            self.signals.contains(&signal)
        }
    }

    impl Drop for PosixSignal {
        fn drop(&mut self) {
            // Drain anything already pending before restoring the mask, so a
            // signal that arrived just before destruction isn't lost to the
            // default disposition.
            unsafe {
                let mut pending = MaybeUninit::<libc::sigset_t>::zeroed().assume_init();
                if libc::sigpending(&mut pending) == 0 {
                    for &s in &self.signals {
                        if libc::sigismember(&pending, s) == 1 {
                            let mut only = MaybeUninit::<libc::sigset_t>::zeroed().assume_init();
                            libc::sigemptyset(&mut only);
                            libc::sigaddset(&mut only, s);
                            let mut caught: c_int = 0;
                            libc::sigwait(&only, &mut caught);
                        }
                    }
                }
                libc::pthread_sigmask(libc::SIG_SETMASK, &self.oldmask, std::ptr::null_mut());
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn wait_one(mask: &libc::sigset_t, timeout: Duration) -> Option<c_int> {
        let ts = libc::timespec {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_nsec: timeout.subsec_nanos() as i64,
        };
        let signal = unsafe { libc::sigtimedwait(mask, std::ptr::null_mut(), &ts) };
        if signal == -1 {
            None
        } else {
            Some(signal)
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn wait_one(mask: &libc::sigset_t, timeout: Duration) -> Option<c_int> {
        // macOS has no sigtimedwait; poll sigpending with a capped backoff
        // and consume via a non-blocking-equivalent sigwait once a member of
        // the mask is actually pending.
        let mut remaining = timeout;
        let poll_delta = Duration::from_millis(10);
        loop {
            let mut pending = unsafe { MaybeUninit::<libc::sigset_t>::zeroed().assume_init() };
            if unsafe { libc::sigpending(&mut pending) } == 0 {
                for s in 1..=31 {
                    if unsafe { libc::sigismember(&pending, s) } == 1
                        && unsafe { libc::sigismember(mask, s) } == 1
                    {
                        let mut caught: c_int = 0;
                        unsafe { libc::sigwait(mask, &mut caught) };
                        return Some(caught);
                    }
                }
            }
            if remaining.is_zero() {
                return None;
            }
            let step = poll_delta.min(remaining);
            std::thread::sleep(step);
            remaining -= step;
        }
    }

    impl Wait for PosixSignal {
        fn wait_for(&self, timeout: Duration) -> bool {
            if !self.open.load(Ordering::Acquire) {
                return true;
            }
            match wait_one(&self.newmask, timeout) {
                None => false,
                Some(signal) if signal == libc::SIGUSR1 => !self.open.load(Ordering::Acquire),
                Some(signal) => {
                    if self.is_member(signal) {
                        self.queue.lock().unwrap().push_back(signal);
                    }
                    true
                }
            }
        }
    }

    impl Channel for PosixSignal {
        fn close(&self) {
            self.open.store(false, Ordering::Release);
            unsafe {
                libc::raise(libc::SIGUSR1);
            }
        }

        fn is_closed(&self) -> bool {
            !self.open.load(Ordering::Acquire) && self.queue.lock().unwrap().is_empty()
        }

        fn is_async(&self) -> bool {
            false
        }
    }

    impl MessageChannel<i32> for PosixSignal {
        fn read(&self) -> Option<i32> {
            self.queue.lock().unwrap().pop_front()
        }
    }
}

#[cfg(not(unix))]
mod inert {
    use super::*;
    use std::sync::Condvar;

    /// Non-Unix targets have no POSIX signal mask to block; this channel
    /// exists so callers compile, but it never produces anything.
    pub struct PosixSignal {
        mutex: Mutex<bool>,
        cv: Condvar,
    }

    impl PosixSignal {
        pub fn new(_signals: Vec<i32>) -> Result<Self, CoreError> {
            Ok(PosixSignal { mutex: Mutex::new(true), cv: Condvar::new() })
        }
    }

    impl Wait for PosixSignal {
        fn wait_for(&self, timeout: Duration) -> bool {
            let guard = self.mutex.lock().unwrap();
            if !*guard {
                return true;
            }
            if timeout.is_zero() {
                return false;
            }
            let (guard, _) = self.cv.wait_timeout_while(guard, timeout, |open| *open).unwrap();
            !*guard
        }
    }

    impl Channel for PosixSignal {
        fn close(&self) {
            let mut guard = self.mutex.lock().unwrap();
            *guard = false;
            self.cv.notify_all();
        }

        fn is_closed(&self) -> bool {
            !*self.mutex.lock().unwrap()
        }

        fn is_async(&self) -> bool {
            false
        }
    }

    impl MessageChannel<i32> for PosixSignal {
        fn read(&self) -> Option<i32> {
            None
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn close_unblocks_wait_for() {
        let sig = PosixSignal::new(vec![libc::SIGUSR2]).expect("construct signal channel");
        sig.close();
        assert!(sig.wait_for(Duration::from_secs(1)));
        assert!(sig.is_closed());
    }

    #[test]
    #[serial]
    fn delivered_signal_is_queued() {
        let sig = PosixSignal::new(vec![libc::SIGUSR2]).expect("construct signal channel");
        unsafe {
            libc::raise(libc::SIGUSR2);
        }
        assert!(sig.wait_for(Duration::from_secs(1)));
        assert_eq!(sig.read(), Some(libc::SIGUSR2));
    }
}
