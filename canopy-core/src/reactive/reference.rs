//! Mutable refs.
//!
//! `use_ref` hands out a [`RefSlot`]: a box whose `current` value can be
//! changed in place at any time. Unlike state, writes never queue the owner
//! for re-evaluation. The slot is created on the first evaluation and the
//! same slot is returned on every later one.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// A mutable cell that survives re-evaluation without triggering it.
pub struct RefSlot<T> {
    current: Arc<Mutex<T>>,
}

impl<T> RefSlot<T>
where
    T: Send + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    /// Read a copy of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.current.lock().clone()
    }

    /// Overwrite the current value.
    pub fn set(&self, value: T) {
        *self.current.lock() = value;
    }

    /// Mutate the current value in place.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.current.lock())
    }

    /// Check whether two handles point at the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.current, &other.current)
    }
}

impl<T> Clone for RefSlot<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RefSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSlot")
            .field("current", &*self.current.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_mutates_in_place() {
        let count = RefSlot::new(0);
        for _ in 0..5 {
            count.with_mut(|n| *n += 1);
        }
        assert_eq!(count.get(), 5);

        count.set(-1);
        assert_eq!(count.get(), -1);
    }

    #[test]
    fn clones_share_identity() {
        let a = RefSlot::new(String::new());
        let b = a.clone();
        let c = RefSlot::new(String::new());

        b.with_mut(|s| s.push_str("focused"));
        assert_eq!(a.get(), "focused");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
