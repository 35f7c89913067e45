use serde::{Deserialize, Serialize};
use statekeep_common::ElementId;
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// An event record produced by every structural change and update pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeEvent {
    /// Element was mounted under `parent` (`None` for the root).
    Mounted {
        id: ElementId,
        parent: Option<ElementId>,
    },
    /// Element was removed from the tree.
    Dismounted { id: ElementId },
    /// Element was re-rendered during the update pass at `tick`.
    Updated { id: ElementId, tick: u64 },
}

/// Errors from structural tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("parent element {0} is not mounted")]
    ParentNotMounted(ElementId),
    #[error("element {0} is already mounted")]
    AlreadyMounted(ElementId),
}

/// Per-element data stored in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub label: String,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
}

/// The live component tree.
///
/// Owns element lifetime. Other subsystems hold [`ElementId`] handles and ask
/// the tree whether they are still mounted.
///
/// Uses BTreeMap/BTreeSet so update passes visit elements in a deterministic
/// order.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: BTreeMap<ElementId, Node>,
    root: Option<ElementId>,
    /// Elements waiting for the next update pass.
    dirty: BTreeSet<ElementId>,
    tick: u64,
    /// Append-only log of structural changes and updates.
    event_log: Vec<TreeEvent>,
}

impl Tree {
    /// Create an empty tree at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed update passes.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn root(&self) -> Option<ElementId> {
        self.root
    }

    /// Number of mounted elements.
    pub fn element_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_mounted(&self, id: ElementId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: ElementId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Read-only access to all mounted elements.
    pub fn elements(&self) -> &BTreeMap<ElementId, Node> {
        &self.nodes
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn events(&self) -> &[TreeEvent] {
        &self.event_log
    }

    /// Mount a new root element, replacing (and dismounting) the current one.
    pub fn mount_root(&mut self, label: impl Into<String>) -> ElementId {
        let id = ElementId::new();
        self.mount_root_with_id(id, label);
        id
    }

    /// Mount an existing handle as the root. Re-mounting a previously
    /// dismounted element makes it live again.
    pub fn mount_root_with_id(&mut self, id: ElementId, label: impl Into<String>) {
        if let Some(old) = self.root.take() {
            self.dismount(old);
        }
        // The handle may still sit deeper in the new tree's predecessor.
        self.dismount(id);
        self.insert(id, None, label.into());
        self.root = Some(id);
    }

    /// Mount a new child under `parent`.
    pub fn mount_child(
        &mut self,
        parent: ElementId,
        label: impl Into<String>,
    ) -> Result<ElementId, TreeError> {
        let id = ElementId::new();
        self.mount_child_with_id(parent, id, label)?;
        Ok(id)
    }

    /// Mount an existing handle under `parent`.
    pub fn mount_child_with_id(
        &mut self,
        parent: ElementId,
        id: ElementId,
        label: impl Into<String>,
    ) -> Result<(), TreeError> {
        if self.nodes.contains_key(&id) {
            return Err(TreeError::AlreadyMounted(id));
        }
        let Some(parent_node) = self.nodes.get_mut(&parent) else {
            return Err(TreeError::ParentNotMounted(parent));
        };
        parent_node.children.push(id);
        self.insert(id, Some(parent), label.into());
        Ok(())
    }

    /// Remove an element and its whole subtree. Returns how many elements
    /// were dismounted (0 if `id` was not mounted).
    pub fn dismount(&mut self, id: ElementId) -> usize {
        let Some(node) = self.nodes.get(&id) else {
            return 0;
        };
        if let Some(parent) = node.parent
            && let Some(parent_node) = self.nodes.get_mut(&parent)
        {
            parent_node.children.retain(|c| *c != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
                self.dirty.remove(&current);
                self.event_log.push(TreeEvent::Dismounted { id: current });
                removed += 1;
            }
        }
        tracing::debug!(element = %id.short(), removed, "dismounted subtree");
        removed
    }

    /// Request an update of `id` during the next pass. Requests for the same
    /// element are coalesced. Returns false if the element is not mounted.
    pub fn schedule_update(&mut self, id: ElementId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.dirty.insert(id);
        true
    }

    /// Number of elements waiting for the next pass.
    pub fn pending_updates(&self) -> usize {
        self.dirty.len()
    }

    /// Run one update pass: advance the tick and return every element that
    /// requested an update, each exactly once.
    pub fn take_updates(&mut self) -> Vec<ElementId> {
        self.tick += 1;
        let updated: Vec<ElementId> = std::mem::take(&mut self.dirty).into_iter().collect();
        for id in &updated {
            self.event_log.push(TreeEvent::Updated {
                id: *id,
                tick: self.tick,
            });
        }
        tracing::trace!(tick = self.tick, updated = updated.len(), "update pass");
        updated
    }

    fn insert(&mut self, id: ElementId, parent: Option<ElementId>, label: String) {
        self.nodes.insert(
            id,
            Node {
                label,
                parent,
                children: Vec::new(),
            },
        );
        self.event_log.push(TreeEvent::Mounted { id, parent });
    }
}

/// Shared handle to a [`Tree`], held by the host loop and the state store.
///
/// Single-threaded by construction: the tree, the store and the host all run
/// on one cooperative context.
#[derive(Debug, Clone, Default)]
pub struct TreeHandle(Rc<RefCell<Tree>>);

impl TreeHandle {
    pub fn new(tree: Tree) -> Self {
        Self(Rc::new(RefCell::new(tree)))
    }

    /// Create a handle to a fresh tree whose root is `label`.
    pub fn with_root(label: impl Into<String>) -> (Self, ElementId) {
        let mut tree = Tree::new();
        let root = tree.mount_root(label);
        (Self::new(tree), root)
    }

    pub fn borrow(&self) -> Ref<'_, Tree> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Tree> {
        self.0.borrow_mut()
    }

    pub fn is_mounted(&self, id: ElementId) -> bool {
        self.0.borrow().is_mounted(id)
    }
}
