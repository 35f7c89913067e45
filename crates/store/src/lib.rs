//! Reactive state store.
//!
//! Associates string keys with typed values, delivers changes to observers
//! bound to UI elements, persists selected values through
//! [`statekeep_persist`], and reclaims observers whose element left the tree.
//!
//! # Invariants
//! - An expired entry is never handed to a reader; it is evicted (memory and
//!   backend) the moment it is seen.
//! - Observer liveness is re-evaluated on every delivery and every sweep.
//! - Reads and persistence failures degrade to "absent"; only invalid
//!   observer construction panics.

pub mod binding;
pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod observer;
pub mod options;
pub mod runtime;
pub mod store;
pub mod value;

pub use binding::Binding;
pub use config::StoreConfig;
pub use dispatcher::Dispatcher;
pub use entry::StateEntry;
pub use observer::{Observer, ObserverBuilder};
pub use options::SetOption;
pub use runtime::{Runtime, UpdateCycle};
pub use store::{Store, SweepReport};
pub use value::{Slot, StateValue, StoredValue};

use statekeep_persist::PersistError;

/// Why a strict store operation did not complete.
///
/// The default API ([`Store::get`], [`Store::set`]) swallows all of these;
/// the `try_` variants return them.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("type mismatch: receiver expects {expected}, stored value is {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("value has expired")]
    Expired,
    #[error("no value for key")]
    NotFound,
    #[error("receiver is already borrowed")]
    ReceiverBusy,
    #[error("key {0} is reserved for the installation identity")]
    ReservedKey(String),
    #[error("value could not be encoded: {0}")]
    Encoding(#[source] PersistError),
    #[error("persisted value could not be decoded: {0}")]
    Decoding(#[source] PersistError),
    #[error("backend error: {0}")]
    Backend(#[source] PersistError),
}
