use statekeep_common::ElementId;
use statekeep_persist::{Backend, Fetch, MemoryBackend, Pipeline};
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use crate::binding::Binding;
use crate::config::StoreConfig;
use crate::dispatcher::Dispatcher;
use crate::entry::StateEntry;
use crate::observer::{Observer, ObserverBuilder};
use crate::options::{Policy, SetOption};
use crate::value::{Slot, StateValue};
use crate::StateError;

/// What one maintenance pass reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub observers_removed: usize,
    pub entries_expired: usize,
}

/// Process-wide reactive key/value store.
///
/// Owns every [`StateEntry`] and its observers. Talks to the component tree
/// through `D` and to durable storage through a [`Pipeline`] over `B`.
///
/// All operations run synchronously on the caller's context. Bindings and
/// the tree must not be borrowed across a store call.
pub struct Store<D: Dispatcher, B: Backend = MemoryBackend> {
    dispatcher: D,
    pipeline: Pipeline<B>,
    states: BTreeMap<String, StateEntry>,
    config: StoreConfig,
}

impl<D: Dispatcher, B: Backend> Store<D, B> {
    pub fn new(dispatcher: D, backend: B) -> Self {
        Self::with_config(dispatcher, backend, StoreConfig::default())
    }

    pub fn with_config(dispatcher: D, backend: B, config: StoreConfig) -> Self {
        let pipeline = Pipeline::with_identity_key(backend, config.identity_key.clone());
        Self {
            dispatcher,
            pipeline,
            states: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn backend(&self) -> &B {
        self.pipeline.backend()
    }

    /// Number of in-memory entries.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.states.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn entry(&self, key: &str) -> Option<&StateEntry> {
        self.states.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &StateEntry)> {
        self.states.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn observer_count(&self, key: &str) -> usize {
        self.states.get(key).map_or(0, StateEntry::observer_count)
    }

    /// Copy the value of `key` into `dest`.
    ///
    /// Falls back to the backend when the key is not in memory. Leaves `dest`
    /// untouched when the key is missing, expired or holds another type.
    pub fn get<T: StateValue + Default>(&mut self, key: &str, dest: &mut T) {
        if let Err(e) = self.try_get(key, dest) {
            log_read_failure(key, &e);
        }
    }

    /// [`get`](Self::get) that reports why `dest` was not written.
    pub fn try_get<T: StateValue + Default>(
        &mut self,
        key: &str,
        dest: &mut T,
    ) -> Result<(), StateError> {
        self.load::<T>(key)?.copy_into(dest)
    }

    /// Store `value` in memory only, with no expiration.
    pub fn set<T: StateValue>(&mut self, key: &str, value: T) {
        self.set_with(key, value, &[]);
    }

    /// Store `value` under `options` and deliver it to live observers.
    ///
    /// Persistence is best effort: if the value cannot be encoded or written
    /// the in-memory value is still updated and observers still notified.
    pub fn set_with<T: StateValue>(&mut self, key: &str, value: T, options: &[SetOption]) {
        if let Err(e) = self.try_set_with(key, value, options) {
            log_write_failure(key, &e);
        }
    }

    /// [`set_with`](Self::set_with) that reports persistence failures. The
    /// in-memory update and delivery happen either way, except for the
    /// reserved installation identity key, which is rejected untouched.
    pub fn try_set_with<T: StateValue>(
        &mut self,
        key: &str,
        value: T,
        options: &[SetOption],
    ) -> Result<(), StateError> {
        self.put(key, Slot::new(value), options)
    }

    /// Store the empty value: observers and readers reset to their default.
    pub fn reset(&mut self, key: &str) {
        self.reset_with(key, &[]);
    }

    pub fn reset_with(&mut self, key: &str, options: &[SetOption]) {
        if let Err(e) = self.put(key, Slot::Empty, options) {
            log_write_failure(key, &e);
        }
    }

    /// Remove `key` from memory and from the backend, expired or not.
    /// Its observers are dropped without delivery.
    ///
    /// The installation identity row is reserved and never deleted.
    pub fn del(&mut self, key: &str) {
        if *key == self.config.identity_key {
            tracing::warn!(key, "refusing to delete the installation identity row");
            return;
        }
        self.states.remove(key);
        if let Err(e) = self.pipeline.delete(key) {
            tracing::warn!(key, error = %e, "failed to delete persisted value");
        }
    }

    /// Start observing `key` on behalf of `element`.
    pub fn observe(&mut self, key: &str, element: ElementId) -> ObserverBuilder<'_, D, B> {
        ObserverBuilder::new(self, key.to_string(), element)
    }

    /// Drop every observer that is no longer live. Returns how many were
    /// removed.
    pub fn remove_unused_observers(&mut self) -> usize {
        let dispatcher = &self.dispatcher;
        let removed: usize = self
            .states
            .values_mut()
            .map(|entry| entry.retain_live(dispatcher))
            .sum();
        if removed > 0 {
            tracing::debug!(removed, "removed unused observers");
        }
        removed
    }

    /// Evict every expired entry from memory and from the backend. Observers
    /// of evicted keys are dropped without delivery. Returns how many entries
    /// were evicted.
    pub fn expire_expired_values(&mut self) -> usize {
        let now = SystemTime::now();
        let expired: Vec<String> = self
            .states
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.evict(key);
        }
        expired.len()
    }

    /// Run both maintenance passes.
    pub fn sweep(&mut self) -> SweepReport {
        let _span = tracing::debug_span!("store_sweep", entries = self.states.len()).entered();
        let report = SweepReport {
            observers_removed: self.remove_unused_observers(),
            entries_expired: self.expire_expired_values(),
        };
        tracing::trace!(?report, "sweep complete");
        report
    }

    /// Release all in-memory state. The backend is left as is.
    pub fn cleanup(&mut self) {
        self.states.clear();
    }

    /// Tear the store down and hand back its backend.
    pub fn into_backend(self) -> B {
        self.pipeline.into_backend()
    }

    pub(crate) fn subscribe<T: StateValue + Default>(
        &mut self,
        key: String,
        observer: Observer,
        dest: &Binding<T>,
    ) {
        let delivered = match dest.try_borrow_mut() {
            Some(mut value) => self.try_get(&key, &mut *value),
            None => Err(StateError::ReceiverBusy),
        };
        if let Err(e) = delivered {
            log_read_failure(&key, &e);
        }
        tracing::trace!(key = %key, element = %observer.element().short(), "observer registered");
        self.states.entry(key).or_default().observers.push(observer);
    }

    /// Resolve `key` to a live slot, evicting expired entries and restoring
    /// from the backend on a miss.
    fn load<T: StateValue>(&mut self, key: &str) -> Result<&Slot, StateError> {
        let now = SystemTime::now();
        let state = self
            .states
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.value.is_unset()));
        match state {
            Some((true, _)) => {
                self.evict(key);
                return Err(StateError::Expired);
            }
            Some((false, false)) => {}
            Some((false, true)) | None => self.restore::<T>(key, now)?,
        }
        self.states
            .get(key)
            .map(|entry| &entry.value)
            .ok_or(StateError::NotFound)
    }

    fn restore<T: StateValue>(&mut self, key: &str, now: SystemTime) -> Result<(), StateError> {
        let record = match self.pipeline.read(key, now).map_err(StateError::Backend)? {
            Fetch::Missing => return Err(StateError::NotFound),
            Fetch::Expired => return Err(StateError::Expired),
            Fetch::Found(record) => record,
        };
        let value = Slot::decode::<T>(record.payload.as_deref()).map_err(StateError::Decoding)?;
        self.states.entry(key.to_string()).or_default().restore(value, &record);
        tracing::debug!(key, encrypted = record.encrypted, "restored value from backend");
        Ok(())
    }

    fn put(&mut self, key: &str, value: Slot, options: &[SetOption]) -> Result<(), StateError> {
        let policy = Policy::resolve(options, SystemTime::now());
        if *key == self.config.identity_key {
            return Err(StateError::ReservedKey(key.to_string()));
        }

        // A row from an earlier session may exist even when memory has no
        // entry, so a memory-only set always clears it.
        let persisted = if policy.persist {
            self.write_through(key, &value, &policy)
        } else {
            self.delete_stale(key);
            Ok(())
        };
        if persisted.is_err() {
            self.delete_stale(key);
        }

        let entry = self.states.entry(key.to_string()).or_default();
        entry.value = value;
        entry.expires_at = policy.expires_at;
        entry.persistent = policy.persist && persisted.is_ok();
        entry.encrypted = entry.persistent && policy.encrypt;

        self.deliver(key);
        persisted
    }

    fn write_through(&mut self, key: &str, value: &Slot, policy: &Policy) -> Result<(), StateError> {
        let payload = value.encode().map_err(StateError::Encoding)?;
        self.pipeline
            .write(key, payload, policy.encrypt, policy.expires_at)
            .map_err(StateError::Backend)
    }

    /// Drop a record that no longer matches the in-memory value.
    fn delete_stale(&mut self, key: &str) {
        if let Err(e) = self.pipeline.delete(key) {
            tracing::warn!(key, error = %e, "failed to delete stale persisted value");
        }
    }

    /// Deliver the current value of `key` to every live observer, pruning the
    /// dead ones, and schedule one update per notified element.
    fn deliver(&mut self, key: &str) {
        let Some(entry) = self.states.get_mut(key) else {
            return;
        };
        let dispatcher = &self.dispatcher;
        let StateEntry {
            value, observers, ..
        } = entry;

        let mut notified = BTreeSet::new();
        let before = observers.len();
        observers.retain(|observer| {
            if !observer.is_observing(dispatcher) {
                return false;
            }
            match observer.deliver(value) {
                Ok(()) => {
                    notified.insert(observer.element());
                }
                Err(e) => {
                    tracing::trace!(key, element = %observer.element().short(), error = %e, "delivery skipped");
                }
            }
            true
        });
        let pruned = before - observers.len();

        for element in &notified {
            dispatcher.schedule_update(*element);
        }
        tracing::trace!(key, notified = notified.len(), pruned, "delivered");
    }

    fn evict(&mut self, key: &str) {
        self.states.remove(key);
        if let Err(e) = self.pipeline.delete(key) {
            tracing::warn!(key, error = %e, "failed to delete expired value");
        }
        tracing::debug!(key, "evicted expired value");
    }
}

fn log_read_failure(key: &str, error: &StateError) {
    match error {
        StateError::NotFound => tracing::trace!(key, "no value"),
        StateError::Backend(e) => tracing::warn!(key, error = %e, "backend read failed"),
        other => tracing::debug!(key, error = %other, "value not delivered"),
    }
}

fn log_write_failure(key: &str, error: &StateError) {
    match error {
        StateError::Backend(e) => tracing::warn!(key, error = %e, "backend write failed"),
        other => tracing::debug!(key, error = %other, "persistence skipped"),
    }
}
