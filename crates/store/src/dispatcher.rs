use statekeep_common::ElementId;
use statekeep_tree::TreeHandle;

/// What the store needs from the component tree.
pub trait Dispatcher {
    /// Whether `element` is currently part of the live tree.
    fn is_mounted(&self, element: ElementId) -> bool;

    /// Request one update of `element` in the next pass. Repeated requests
    /// before the pass must coalesce.
    fn schedule_update(&self, element: ElementId);
}

impl Dispatcher for TreeHandle {
    fn is_mounted(&self, element: ElementId) -> bool {
        TreeHandle::is_mounted(self, element)
    }

    fn schedule_update(&self, element: ElementId) {
        self.borrow_mut().schedule_update(element);
    }
}
