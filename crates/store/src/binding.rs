use std::cell::{RefCell, RefMut};
use std::rc::Rc;

/// Shared writable cell used as an observer's receiver.
///
/// The element keeps one handle and reads it while rendering; the store keeps
/// another and writes every delivered value into it. Cloning shares the cell.
#[derive(Debug, Default)]
pub struct Binding<T>(Rc<RefCell<T>>);

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Binding<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().clone()
    }

    /// Overwrite locally, e.g. to pre-set a fallback before observing.
    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Whether two handles share the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn try_borrow_mut(&self) -> Option<RefMut<'_, T>> {
        self.0.try_borrow_mut().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_cell() {
        let a = Binding::new(1);
        let b = a.clone();
        b.set(2);
        assert_eq!(a.get(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Binding::new(2)));
    }

    #[test]
    fn with_reads_without_clone() {
        let b = Binding::new(String::from("hello"));
        assert_eq!(b.with(|s| s.len()), 5);
    }

    #[test]
    fn busy_cell_refuses_writes() {
        let b = Binding::new(0);
        let _guard = b.try_borrow_mut().unwrap();
        assert!(b.try_borrow_mut().is_none());
    }
}
