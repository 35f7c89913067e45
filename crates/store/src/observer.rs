//! Subscriptions binding an element, liveness conditions and a receiver to
//! one key.

use statekeep_common::ElementId;
use statekeep_persist::Backend;

use crate::binding::Binding;
use crate::dispatcher::Dispatcher;
use crate::store::Store;
use crate::value::{Slot, StateValue};
use crate::StateError;

/// Type-erased receiver fixed at subscription time.
pub(crate) trait Receiver {
    fn receive(&self, slot: &Slot) -> Result<(), StateError>;
}

impl<T: StateValue + Default> Receiver for Binding<T> {
    fn receive(&self, slot: &Slot) -> Result<(), StateError> {
        let mut dest = self.try_borrow_mut().ok_or(StateError::ReceiverBusy)?;
        slot.copy_into(&mut *dest)
    }
}

/// A subscription to one key.
///
/// Holds only the element's handle. Liveness is asked of the dispatcher on
/// every check and never cached.
pub struct Observer {
    element: ElementId,
    conditions: Vec<Box<dyn Fn() -> bool>>,
    receiver: Option<Box<dyn Receiver>>,
}

impl Observer {
    pub(crate) fn new(element: ElementId) -> Self {
        Self {
            element,
            conditions: Vec::new(),
            receiver: None,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }

    /// Live iff the element is mounted and every condition holds, checked in
    /// that order and short-circuiting.
    pub fn is_observing<D: Dispatcher + ?Sized>(&self, dispatcher: &D) -> bool {
        dispatcher.is_mounted(self.element) && self.conditions.iter().all(|holds| holds())
    }

    pub(crate) fn push_condition(&mut self, condition: Box<dyn Fn() -> bool>) {
        self.conditions.push(condition);
    }

    /// Fix the receiver.
    ///
    /// # Panics
    ///
    /// If a receiver is already bound: an observer delivers to exactly one
    /// destination.
    pub(crate) fn bind(&mut self, receiver: Box<dyn Receiver>) {
        assert!(
            self.receiver.is_none(),
            "observer for element {} already has a receiver",
            self.element
        );
        self.receiver = Some(receiver);
    }

    pub(crate) fn deliver(&self, slot: &Slot) -> Result<(), StateError> {
        match &self.receiver {
            Some(receiver) => receiver.receive(slot),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("element", &self.element)
            .field("conditions", &self.conditions.len())
            .field("bound", &self.receiver.is_some())
            .finish()
    }
}

/// Returned by [`Store::observe`]. Add conditions with [`when`](Self::when),
/// then finalize with [`value`](Self::value).
#[must_use = "the observer is only registered by `value`"]
pub struct ObserverBuilder<'a, D: Dispatcher, B: Backend> {
    store: &'a mut Store<D, B>,
    key: String,
    observer: Observer,
}

impl<'a, D: Dispatcher, B: Backend> ObserverBuilder<'a, D, B> {
    pub(crate) fn new(store: &'a mut Store<D, B>, key: String, element: ElementId) -> Self {
        Self {
            store,
            key,
            observer: Observer::new(element),
        }
    }

    /// Keep observing only while `condition` holds. Conditions are checked in
    /// the order they were added.
    pub fn when(mut self, condition: impl Fn() -> bool + 'static) -> Self {
        self.observer.push_condition(Box::new(condition));
        self
    }

    /// Bind `dest`, deliver the current value into it right away, and
    /// register for every later change of the key.
    pub fn value<T: StateValue + Default>(self, dest: &Binding<T>) {
        let Self {
            store,
            key,
            mut observer,
        } = self;
        observer.bind(Box::new(dest.clone()));
        store.subscribe(key, observer, dest);
    }
}
