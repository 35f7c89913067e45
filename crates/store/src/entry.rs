use statekeep_common::is_expired;
use statekeep_persist::PersistentRecord;
use std::time::SystemTime;

use crate::dispatcher::Dispatcher;
use crate::observer::Observer;
use crate::value::Slot;

/// In-memory record for one key.
#[derive(Debug, Default)]
pub struct StateEntry {
    pub(crate) value: Slot,
    pub(crate) expires_at: Option<SystemTime>,
    pub(crate) persistent: bool,
    pub(crate) encrypted: bool,
    pub(crate) observers: Vec<Observer>,
}

impl StateEntry {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        is_expired(self.expires_at, now)
    }

    pub fn value(&self) -> &Slot {
        &self.value
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn observers(&self) -> &[Observer] {
        &self.observers
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Memory-only and unobserved: the entry could be dropped without losing
    /// anything but its value.
    pub fn is_reclaimable(&self) -> bool {
        !self.persistent && self.observers.is_empty()
    }

    /// Take over value and policy from a persisted record.
    pub(crate) fn restore(&mut self, value: Slot, record: &PersistentRecord) {
        self.value = value;
        self.expires_at = record.expires_at;
        self.persistent = true;
        self.encrypted = record.encrypted;
    }

    /// Drop observers that are no longer live. Returns how many were removed.
    pub(crate) fn retain_live<D: Dispatcher + ?Sized>(&mut self, dispatcher: &D) -> usize {
        let before = self.observers.len();
        self.observers.retain(|o| o.is_observing(dispatcher));
        before - self.observers.len()
    }
}
