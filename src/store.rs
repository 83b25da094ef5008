//! A JSON-backed persistent value, wrapping the `kv` crate (itself built on
//! `sled`) behind a trivially small API: load-or-create, get, set, save.
//!
//! [`PersistentState::autosave_on`] is the one place this module touches the
//! channel framework: it registers a save on every firing of an arbitrary
//! event channel (a [`crate::channel::TimerChannel`] is the usual choice),
//! via the caller's [`Dispatcher`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use kv::{Config, Json, Store};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::channel::EventChannel;
use crate::dispatch::{Dispatcher, Mode, Registration};
use crate::error::CoreError;

/// An in-memory value mirrored to a single key of a `kv` bucket on disk.
pub struct PersistentState<T> {
    store: Store,
    bucket_name: String,
    key: String,
    value: Mutex<T>,
}

impl<T> PersistentState<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Opens (creating if absent) a `kv` store rooted at `db_folder`, then
    /// loads `key` from `bucket_name`, falling back to `default` if the key
    /// is not yet present.
    pub fn load_or_create(
        db_folder: &Path,
        bucket_name: &str,
        key: &str,
        default: T,
    ) -> Result<Self, CoreError> {
        let cfg = Config::new(db_folder);
        let store = Store::new(cfg).map_err(|e| {
            CoreError::invalid_argument(format!("could not open kv store: {e}"))
        })?;

        let value = {
            let bucket = store
                .bucket::<String, Json<T>>(Some(bucket_name))
                .map_err(|e| CoreError::invalid_argument(format!("could not open bucket: {e}")))?;
            match bucket
                .get(&key.to_string())
                .map_err(|e| CoreError::invalid_argument(format!("could not read key: {e}")))?
            {
                Some(Json(v)) => v,
                None => default,
            }
        };

        Ok(PersistentState {
            store,
            bucket_name: bucket_name.to_string(),
            key: key.to_string(),
            value: Mutex::new(value),
        })
    }

    /// Returns a clone of the current in-memory value.
    pub fn get(&self) -> T {
        self.value.lock().unwrap().clone()
    }

    /// Replaces the in-memory value and persists it immediately.
    pub fn set(&self, value: T) -> Result<(), CoreError> {
        *self.value.lock().unwrap() = value;
        self.save()
    }

    /// Writes the current in-memory value to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        let bucket = self
            .store
            .bucket::<String, Json<T>>(Some(&self.bucket_name))
            .map_err(|e| CoreError::invalid_argument(format!("could not open bucket: {e}")))?;
        let value = self.value.lock().unwrap().clone();
        bucket
            .set(&self.key.clone(), &Json(value))
            .map_err(|e| CoreError::invalid_argument(format!("could not write key: {e}")))?;
        Ok(())
    }
}

impl<T> PersistentState<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Registers `chan` with `dispatcher` so that every time it fires, the
    /// current in-memory value is persisted. Returns the registration
    /// handle; dropping it stops the autosave.
    pub fn autosave_on<C>(
        self: &Arc<Self>,
        dispatcher: &Dispatcher,
        chan: Arc<C>,
        mode: Mode,
    ) -> Result<Registration, CoreError>
    where
        C: EventChannel + Send + Sync + 'static,
    {
        let this = Arc::clone(self);
        dispatcher.add_event(chan, mode, move || this.save())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ScratchDir;
    use serial_test::serial;

    #[test]
    #[serial]
    fn round_trips_through_disk() {
        let dir = ScratchDir::create("waitcore-store-test").unwrap();
        let db = dir.join("db");

        let state =
            PersistentState::<u32>::load_or_create(&db, "counter_bucket", "count", 0).unwrap();
        assert_eq!(state.get(), 0);
        state.set(42).unwrap();
        assert_eq!(state.get(), 42);

        // Reopening should observe the persisted value.
        let reopened =
            PersistentState::<u32>::load_or_create(&db, "counter_bucket", "count", 0).unwrap();
        assert_eq!(reopened.get(), 42);
    }

    /// Fires `wait_for` exactly once, then reports itself closed -- just
    /// enough liveness to drive one dispatch sweep and let `run()` return.
    struct OnceChannel {
        fired: std::sync::atomic::AtomicBool,
    }

    impl crate::wait::Wait for OnceChannel {
        fn wait_for(&self, _timeout: std::time::Duration) -> bool {
            !self.fired.swap(true, std::sync::atomic::Ordering::AcqRel)
        }
    }

    impl crate::channel::Channel for OnceChannel {
        fn close(&self) {
            self.fired.store(true, std::sync::atomic::Ordering::Release);
        }

        fn is_closed(&self) -> bool {
            self.fired.load(std::sync::atomic::Ordering::Acquire)
        }
    }

    impl EventChannel for OnceChannel {}

    #[test]
    #[serial]
    fn autosave_runs_on_dispatch() {
        let dir = ScratchDir::create("waitcore-store-autosave-test").unwrap();
        let db = dir.join("db");

        let state = Arc::new(
            PersistentState::<u32>::load_or_create(&db, "b", "k", 0).unwrap(),
        );
        state.set(7).expect("initial save");

        let dispatcher = Dispatcher::new();
        let chan = Arc::new(OnceChannel { fired: std::sync::atomic::AtomicBool::new(false) });
        let _reg = state
            .autosave_on(&dispatcher, chan.clone(), Mode::Sync)
            .unwrap();
        state.set(9).expect("update without explicit save");
        let outcome = dispatcher.run();
        assert!(outcome.error.is_none());

        let reopened = PersistentState::<u32>::load_or_create(&db, "b", "k", 0).unwrap();
        assert_eq!(reopened.get(), 9);
    }
}
