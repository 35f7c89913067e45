//! Host loop glue: one tree, one store, one update pass per `consume`.

use statekeep_common::ElementId;
use statekeep_persist::{Backend, MemoryBackend};
use statekeep_tree::{TreeEvent, TreeHandle};

use crate::config::StoreConfig;
use crate::store::{Store, SweepReport};

/// What one call to [`Runtime::consume`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCycle {
    /// Tree tick after the pass.
    pub tick: u64,
    /// Elements updated in this pass, in id order.
    pub updated: Vec<ElementId>,
    /// Tree events since the previous pass, this pass's updates included.
    pub events: Vec<TreeEvent>,
    pub sweep: SweepReport,
}

/// Owns the component tree and the store observing it.
pub struct Runtime<B: Backend = MemoryBackend> {
    tree: TreeHandle,
    store: Store<TreeHandle, B>,
}

impl Runtime<MemoryBackend> {
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: Backend> Runtime<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        let tree = TreeHandle::default();
        let store = Store::with_config(tree.clone(), backend, config);
        Self { tree, store }
    }

    pub fn tree(&self) -> &TreeHandle {
        &self.tree
    }

    pub fn store(&self) -> &Store<TreeHandle, B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<TreeHandle, B> {
        &mut self.store
    }

    pub fn mount_root(&self, label: impl Into<String>) -> ElementId {
        self.tree.borrow_mut().mount_root(label)
    }

    pub fn mount_root_with_id(&self, id: ElementId, label: impl Into<String>) {
        self.tree.borrow_mut().mount_root_with_id(id, label);
    }

    /// Flush scheduled updates as one pass, then sweep if configured.
    ///
    /// The tree's event log is drained into the returned cycle.
    pub fn consume(&mut self) -> UpdateCycle {
        let (tick, updated, events) = {
            let mut tree = self.tree.borrow_mut();
            let updated = tree.take_updates();
            (tree.tick(), updated, tree.drain_events())
        };
        let sweep = if self.store.config().sweep_on_consume {
            self.store.sweep()
        } else {
            SweepReport::default()
        };
        tracing::debug!(tick, updated = updated.len(), events = events.len(), ?sweep, "update cycle");
        UpdateCycle {
            tick,
            updated,
            events,
            sweep,
        }
    }

    /// Release in-memory state and hand back the backend.
    pub fn close(mut self) -> B {
        self.store.cleanup();
        self.store.into_backend()
    }
}
