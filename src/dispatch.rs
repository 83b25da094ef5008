//! Central registration-ordered scheduler driving channels to readiness.
//!
//! A [`Dispatcher`] is a bag of channel registrations, each paired with a
//! handler invoked when its channel becomes ready. Registrations made in
//! [`Mode::Sync`] are polled in registration order by [`Dispatcher::run`];
//! registrations made in [`Mode::Async`] get a dedicated worker thread that
//! blocks in the channel's own `wait_for` for as long as the registration
//! lives. Dropping a [`Registration`] deregisters it without touching the
//! underlying channel -- closing the channel is the caller's business.
//!
//! Unlike the channel registries this is modeled on, a `Dispatcher` is an
//! owned value, not a process-wide singleton: construct as many as a
//! program needs, typically one per subsystem, and registration order is a
//! plain `Vec`, not an incidental artifact of pointer-address ordering.
//! A `Dispatcher` is also explicitly not `Sync` -- `add`/`run`/`stop` are a
//! single-owner contract, not something two threads may call concurrently
//! on the same instance.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{instrument, trace};

use crate::channel::{Channel, EventChannel, MessageChannel, StreamChannel};
use crate::config::DispatchConfig;
use crate::error::CoreError;

/// How a registration is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Polled in registration order by [`Dispatcher::run`].
    Sync,
    /// Driven by a dedicated worker thread for the life of the registration.
    /// Requires the channel's [`Channel::is_async`] to be `true`.
    Async,
}

/// Why [`Dispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Reason {
    /// No sync registration fired this call, but at least one is still open
    /// (or only async registrations remain and none has finished yet).
    Empty,
    /// Every registration this dispatcher knows about has closed.
    Closed,
    /// A handler (sync or async) returned `Err`; that registration's
    /// channel and error are carried on [`DispatchOutcome`].
    Error,
}

/// Summary of one [`Dispatcher::run`] call.
pub struct DispatchOutcome {
    /// Handlers invoked during this call.
    pub fired: usize,
    /// Registrations still held after this call.
    pub remaining: usize,
    pub reason: Reason,
    /// The channel that caused termination (closed, or whose handler
    /// erred). `None` when `reason` is [`Reason::Empty`].
    pub terminator: Option<Arc<dyn Channel>>,
    /// The error a handler returned, if `reason` is [`Reason::Error`].
    pub error: Option<CoreError>,
}

type Fire = dyn Fn() -> Result<(), CoreError> + Send + Sync;

struct AsyncState {
    done: AtomicBool,
    error: Mutex<Option<CoreError>>,
}

struct Task {
    channel: Arc<dyn Channel>,
    fire: Arc<Fire>,
    mode: Mode,
    stop: Arc<AtomicBool>,
    /// Populated only for [`Mode::Async`] registrations.
    async_state: Option<Arc<AsyncState>>,
}

struct Inner {
    order: Vec<u64>,
    tasks: HashMap<u64, Task>,
    identities: HashSet<usize>,
}

fn identity(channel: &Arc<dyn Channel>) -> usize {
    Arc::as_ptr(channel) as *const () as usize
}

fn deregister_locked(inner: &mut Inner, id: u64) {
    if let Some(task) = inner.tasks.remove(&id) {
        inner.order.retain(|&existing| existing != id);
        inner.identities.remove(&identity(&task.channel));
        task.stop.store(true, Ordering::Release);
    }
}

/// Owns a set of channel registrations and drives them to readiness.
pub struct Dispatcher {
    inner: Arc<Mutex<Inner>>,
    next_id: AtomicU64,
    config: DispatchConfig,
    /// Forces `!Sync`: `add`/`run`/`stop` are a single-owner contract, not
    /// one this type enforces via internal locking alone.
    _not_sync: Cell<()>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Dispatcher {
            inner: Arc::new(Mutex::new(Inner {
                order: Vec::new(),
                tasks: HashMap::new(),
                identities: HashSet::new(),
            })),
            next_id: AtomicU64::new(1),
            config,
            _not_sync: Cell::new(()),
        }
    }

    fn register(&self, channel: Arc<dyn Channel>, mode: Mode, fire: Arc<Fire>) -> Result<Registration, CoreError> {
        if mode == Mode::Async && !channel.is_async() {
            return Err(CoreError::invalid_argument("channel does not support async dispatch"));
        }

        let mut inner = self.inner.lock().unwrap();
        let key = identity(&channel);
        if !channel.is_shared() && inner.identities.contains(&key) {
            return Err(CoreError::invalid_argument(
                "channel is already registered and does not support sharing",
            ));
        }
        inner.identities.insert(key);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(AtomicBool::new(false));

        let async_state = if mode == Mode::Async {
            let state = Arc::new(AsyncState { done: AtomicBool::new(false), error: Mutex::new(None) });
            let worker_channel = channel.clone();
            let worker_fire = fire.clone();
            let worker_stop = stop.clone();
            let worker_state = state.clone();
            // Detached: the thread exits on its own once `stop` is set or
            // the channel closes, so there's nothing to join here.
            thread::spawn(move || {
                loop {
                    if worker_stop.load(Ordering::Acquire) {
                        return;
                    }
                    if !worker_channel.wait_for(Duration::from_secs(1)) {
                        continue;
                    }
                    if worker_channel.is_closed() {
                        break;
                    }
                    if let Err(e) = (worker_fire)() {
                        *worker_state.error.lock().unwrap() = Some(e);
                        break;
                    }
                }
                worker_state.done.store(true, Ordering::Release);
            });
            Some(state)
        } else {
            None
        };

        inner.order.push(id);
        inner.tasks.insert(id, Task { channel, fire, mode, stop, async_state });

        Ok(Registration { id, inner: self.inner.clone() })
    }

    /// Registers an [`EventChannel`]: `handler` runs once each time the
    /// channel becomes ready, and may fail the whole dispatch run by
    /// returning `Err`.
    pub fn add_event<C>(
        &self,
        channel: Arc<C>,
        mode: Mode,
        handler: impl FnMut() -> Result<(), CoreError> + Send + 'static,
    ) -> Result<Registration, CoreError>
    where
        C: EventChannel + 'static,
    {
        let handler = Mutex::new(handler);
        let dyn_channel: Arc<dyn Channel> = channel;
        let fire: Arc<Fire> = Arc::new(move || (handler.lock().unwrap())());
        self.register(dyn_channel, mode, fire)
    }

    /// Registers a [`MessageChannel<T>`]: `handler` runs once per value,
    /// draining every value available each time the channel is found
    /// ready. The first `Err` aborts the drain for this sweep.
    pub fn add_message<T, C>(
        &self,
        channel: Arc<C>,
        mode: Mode,
        handler: impl FnMut(T) -> Result<(), CoreError> + Send + 'static,
    ) -> Result<Registration, CoreError>
    where
        T: Send + 'static,
        C: MessageChannel<T> + 'static,
    {
        let handler = Mutex::new(handler);
        let read_channel = channel.clone();
        let dyn_channel: Arc<dyn Channel> = channel;
        let fire: Arc<Fire> = Arc::new(move || {
            let mut handler = handler.lock().unwrap();
            loop {
                match read_channel.read() {
                    Some(value) => handler(value)?,
                    None => return Ok(()),
                }
            }
        });
        self.register(dyn_channel, mode, fire)
    }

    /// Registers a [`StreamChannel`]: `handler` runs once per chunk read,
    /// draining the stream each time the channel is found ready. The first
    /// `Err` aborts the drain for this sweep.
    pub fn add_stream<C>(
        &self,
        channel: Arc<C>,
        mode: Mode,
        handler: impl FnMut(&mut Vec<u8>) -> Result<(), CoreError> + Send + 'static,
    ) -> Result<Registration, CoreError>
    where
        C: StreamChannel + 'static,
    {
        let handler = Mutex::new(handler);
        let read_channel = channel.clone();
        let dyn_channel: Arc<dyn Channel> = channel;
        let fire: Arc<Fire> = Arc::new(move || {
            let mut handler = handler.lock().unwrap();
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let n = read_channel.read_to(&mut buf);
                if n == 0 {
                    return Ok(());
                }
                handler(&mut buf)?;
            }
        });
        self.register(dyn_channel, mode, fire)
    }

    /// Drives registered channels until one terminating event happens:
    /// every registration closes, a handler (sync or async) returns `Err`,
    /// or nothing was registered to begin with. A single call may perform
    /// many sweeps internally -- it does not return merely because a sweep
    /// produced callbacks, only backing off (doubling from
    /// [`DispatchConfig::min_interval`] up to [`DispatchConfig::max_interval`])
    /// between sweeps that fired nothing.
    #[instrument(level = "trace", skip(self))]
    pub fn run(&self) -> DispatchOutcome {
        let mut interval = self.config.min_interval;
        let mut fired = 0usize;
        loop {
            let ids: Vec<u64> = self.inner.lock().unwrap().order.clone();
            if ids.is_empty() {
                return DispatchOutcome { fired, remaining: 0, reason: Reason::Empty, terminator: None, error: None };
            }

            let mut fired_this_sweep = 0;

            for id in &ids {
                let entry = {
                    let inner = self.inner.lock().unwrap();
                    inner.tasks.get(id).map(|t| {
                        (t.channel.clone(), t.fire.clone(), t.mode, t.async_state.clone())
                    })
                };
                let Some((channel, fire, mode, async_state)) = entry else {
                    continue;
                };

                if let Some(state) = &async_state {
                    if state.done.load(Ordering::Acquire) {
                        let error = state.error.lock().unwrap().take();
                        let reason = if error.is_some() { Reason::Error } else { Reason::Closed };
                        deregister_locked(&mut self.inner.lock().unwrap(), *id);
                        let remaining = self.inner.lock().unwrap().order.len();
                        return DispatchOutcome { fired, remaining, reason, terminator: Some(channel), error };
                    }
                    continue;
                }

                if mode != Mode::Sync {
                    continue;
                }
                // A channel found closed here -- whether closed before this
                // call or by its own callback during an earlier sweep of
                // this same call -- ends the whole run, per the registered
                // channel that closed.
                if channel.is_closed() {
                    deregister_locked(&mut self.inner.lock().unwrap(), *id);
                    let remaining = self.inner.lock().unwrap().order.len();
                    return DispatchOutcome { fired, remaining, reason: Reason::Closed, terminator: Some(channel), error: None };
                }
                if channel.wait_for(Duration::ZERO) {
                    match fire() {
                        Ok(()) => {
                            fired += 1;
                            fired_this_sweep += 1;
                        }
                        Err(e) => {
                            let remaining = self.inner.lock().unwrap().order.len();
                            return DispatchOutcome {
                                fired,
                                remaining,
                                reason: Reason::Error,
                                terminator: Some(channel),
                                error: Some(e),
                            };
                        }
                    }
                }
            }

            if fired_this_sweep > 0 {
                trace!(fired_this_sweep, "sweep produced callbacks");
                thread::yield_now();
                interval = self.config.min_interval;
                continue;
            }

            // Every id in this sweep was either a pending (not-done) async
            // task, or a sync task that's open but not yet ready -- nothing
            // to report, so back off and sweep again.
            thread::sleep(interval);
            interval = (interval * 2).min(self.config.max_interval);
        }
    }

    /// Closes every registered channel, then drains sync registrations with
    /// repeated [`Dispatcher::run`] calls until nothing remains.
    pub fn stop(&self) {
        let channels: Vec<Arc<dyn Channel>> =
            self.inner.lock().unwrap().tasks.values().map(|t| t.channel.clone()).collect();
        for channel in channels {
            channel.close();
        }
        loop {
            let outcome = self.run();
            if outcome.remaining == 0 {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// A guard returned by `Dispatcher::add_*`. Dropping it deregisters the
/// task; it does not close the underlying channel.
pub struct Registration {
    id: u64,
    inner: Arc<Mutex<Inner>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        deregister_locked(&mut self.inner.lock().unwrap(), self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{GeneratorChannel, TimerChannel, TrueChannel, ValueChannel};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn sync_event_handler_fires_until_channel_closes() {
        let dispatcher = Dispatcher::new();
        let chan = Arc::new(TrueChannel::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let closing = chan.clone();
        let _reg = dispatcher
            .add_event(chan, Mode::Sync, move || {
                counted.fetch_add(1, Ordering::SeqCst);
                closing.close();
                Ok(())
            })
            .expect("register");

        let outcome = dispatcher.run();
        assert_eq!(outcome.reason, Reason::Closed);
        assert_eq!(outcome.fired, 1);
        assert!(outcome.error.is_none());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_registration_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let chan = Arc::new(TrueChannel::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let closing = chan.clone();
        let reg = dispatcher
            .add_event(chan, Mode::Sync, move || {
                counted.fetch_add(1, Ordering::SeqCst);
                closing.close();
                Ok(())
            })
            .expect("register");

        dispatcher.run();
        drop(reg);
        assert!(dispatcher.is_empty());
        let outcome = dispatcher.run();
        assert_eq!(outcome.fired, 0);
        assert_eq!(outcome.reason, Reason::Empty);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn message_handler_drains_every_value_before_closing() {
        let dispatcher = Dispatcher::new();
        let chan = Arc::new(ValueChannel::with_value(0));
        chan.write(1);
        chan.write(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let collected = seen.clone();
        let closing = chan.clone();
        let _reg = dispatcher
            .add_message(chan, Mode::Sync, move |v| {
                collected.lock().unwrap().push(v);
                if v == 2 {
                    closing.close();
                }
                Ok(())
            })
            .expect("register");

        let outcome = dispatcher.run();
        assert_eq!(outcome.reason, Reason::Closed);
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn non_shared_channel_rejects_double_registration() {
        let dispatcher = Dispatcher::new();
        let chan = Arc::new(GeneratorChannel::new(|| Some(1)));
        let _first =
            dispatcher.add_message(chan.clone(), Mode::Sync, |_: i32| Ok(())).expect("first registers");
        let second = dispatcher.add_message(chan, Mode::Sync, |_: i32| Ok(()));
        assert!(second.is_err());
    }

    #[test]
    fn stop_closes_channels_and_drains_registrations() {
        let dispatcher = Dispatcher::new();
        let chan = Arc::new(TrueChannel::new());
        let _reg = dispatcher.add_event(chan.clone(), Mode::Sync, || Ok(())).expect("register");
        dispatcher.stop();
        assert!(chan.is_closed());
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn sync_handler_error_terminates_run_with_that_channel() {
        let dispatcher = Dispatcher::new();
        let chan = Arc::new(TrueChannel::new());
        let _reg = dispatcher
            .add_event(chan.clone(), Mode::Sync, || Err(CoreError::invalid_argument("boom")))
            .expect("register");

        let outcome = dispatcher.run();
        assert_eq!(outcome.reason, Reason::Error);
        assert!(outcome.error.is_some());
        assert!(Arc::ptr_eq(&(outcome.terminator.unwrap()), &(chan as Arc<dyn Channel>)));
    }

    // Mirrors spec scenario S1: a sync timer callback that closes its own
    // channel after a fixed number of ticks terminates `run()` with
    // `Reason::Closed` and that exact tick count observed.
    #[test]
    fn timer_closing_itself_from_callback_terminates_cleanly() {
        let dispatcher = Dispatcher::new();
        let timer = Arc::new(TimerChannel::new(Duration::from_micros(200)));
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let closing_timer = timer.clone();
        let _reg = dispatcher
            .add_event(timer, Mode::Sync, move || {
                let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 20 {
                    closing_timer.close();
                }
                Ok(())
            })
            .expect("register");

        let outcome = dispatcher.run();
        assert_eq!(outcome.reason, Reason::Closed);
        assert_eq!(count.load(Ordering::SeqCst), 20);
    }

    // Mirrors spec scenario S5: an async worker whose handler errors is
    // reported as the run's terminator, without disturbing a second,
    // independently registered async channel.
    #[test]
    fn async_handler_error_is_captured_as_terminator() {
        let dispatcher = Dispatcher::new();
        let failing = Arc::new(TimerChannel::new(Duration::from_millis(1)));
        let benign = Arc::new(TimerChannel::new(Duration::from_millis(1)));

        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let _failing_reg = dispatcher
            .add_event(failing.clone(), Mode::Async, move || {
                let n = counted.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 20 {
                    Err(CoreError::invalid_argument("async boom"))
                } else {
                    Ok(())
                }
            })
            .expect("register failing");
        let _benign_reg = dispatcher.add_event(benign, Mode::Async, || Ok(())).expect("register benign");

        let outcome = dispatcher.run();
        assert_eq!(outcome.reason, Reason::Error);
        assert!(outcome.error.is_some());
        assert!(Arc::ptr_eq(&(outcome.terminator.unwrap()), &(failing as Arc<dyn Channel>)));
    }
}
