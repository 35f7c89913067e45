//! Developer tooling for the state store.
//!
//! # Invariants
//! - Inspection is read-only: it never triggers a backend read, an eviction
//!   or a delivery.

pub mod inspector;

pub use inspector::{EntryInfo, StoreInspector, StoreSummary};
