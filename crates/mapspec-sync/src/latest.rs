use std::cell::RefCell;
use std::rc::Rc;

/// A shared box holding the most recent value.
///
/// Callbacks registered once hold a clone of the cell and read it when
/// they fire, so they always observe what the last update cycle stored.
#[derive(Debug, Default)]
pub struct LatestCell<T> {
    value: Rc<RefCell<T>>,
}

impl<T> Clone for LatestCell<T> {
    fn clone(&self) -> Self {
        Self {
            value: Rc::clone(&self.value),
        }
    }
}

impl<T> LatestCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }
}

impl<T: Clone> LatestCell<T> {
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}
