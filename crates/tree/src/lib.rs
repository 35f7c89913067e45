//! Component tree: the registry of mounted UI elements and the update pass.
//!
//! # Invariants
//! - An element is mounted iff it is reachable from the current root.
//! - Dismounting an element dismounts its whole subtree.
//! - Update requests are coalesced: one update per element per pass.

pub mod tree;

pub use tree::{Node, Tree, TreeError, TreeEvent, TreeHandle};
