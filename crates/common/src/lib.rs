//! Shared types for the statekeep workspace.

pub mod expiry;
pub mod types;

pub use expiry::{deadline_after, is_expired};
pub use types::ElementId;
