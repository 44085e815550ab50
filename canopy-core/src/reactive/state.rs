//! State Slots
//!
//! A state slot is the value half of `use_state`. It lives in the hook list
//! of its owning instance and survives re-evaluations of that instance.
//!
//! # Committed vs. pending
//!
//! Each slot keeps two values:
//!
//! - `committed`: what the current evaluation pass sees
//! - `pending`: the result of setter calls since the last evaluation
//!
//! Setter calls apply in call order against the latest pending value, so
//! three `update(|n| n + 1)` calls in one event add three, not one. The
//! pending value becomes committed when the owner is next evaluated.
//!
//! # Stale setters
//!
//! A setter keeps only a weak link to the runtime. Calling it after its
//! owner was unmounted (or after the runtime was dropped) returns
//! [`CoreError::StaleSetter`] and changes nothing.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::graph::InstanceId;

/// Where setters report that their owner needs re-evaluation.
pub(crate) trait DirtySink: Send + Sync {
    /// Check whether the instance is still mounted.
    fn is_live(&self, instance: InstanceId) -> bool;

    /// Queue the instance for re-evaluation.
    fn mark_dirty(&self, instance: InstanceId) -> Result<()>;
}

/// A state update: either a replacement value or a function of the latest
/// value.
pub enum SetAction<T> {
    Value(T),
    Update(Box<dyn FnOnce(&T) -> T + Send>),
}

impl<T> From<T> for SetAction<T> {
    fn from(value: T) -> Self {
        SetAction::Value(value)
    }
}

impl<T> fmt::Debug for SetAction<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetAction::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SetAction::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// Storage behind one `use_state` call.
#[derive(Debug)]
pub(crate) struct StateCell<T> {
    committed: T,
    pending: Option<T>,
}

impl<T> StateCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(initial: T) -> Self {
        Self {
            committed: initial,
            pending: None,
        }
    }

    /// Most recent value, including uncommitted updates.
    fn latest(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.committed)
    }

    /// Promote the pending value, returning what the evaluation should see.
    pub(crate) fn commit(&mut self) -> T {
        if let Some(pending) = self.pending.take() {
            self.committed = pending;
        }
        self.committed.clone()
    }

    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Shared handle to a state cell, as stored in the hook list.
pub(crate) type SharedCell<T> = Arc<Mutex<StateCell<T>>>;

/// The setter half of `use_state`.
///
/// Setters are cheap to clone and may be moved into event handlers,
/// effects, or other instances.
pub struct Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    instance: InstanceId,
    cell: SharedCell<T>,
    sink: Weak<dyn DirtySink>,
}

impl<T> Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(instance: InstanceId, cell: SharedCell<T>, sink: Weak<dyn DirtySink>) -> Self {
        Self {
            instance,
            cell,
            sink,
        }
    }

    /// The instance this setter re-evaluates.
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Replace the value.
    pub fn set(&self, value: T) -> Result<()> {
        self.dispatch(SetAction::Value(value))
    }

    /// Derive the next value from the latest one.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.dispatch(SetAction::Update(Box::new(f)))
    }

    /// Apply a [`SetAction`] and queue the owner for re-evaluation.
    pub fn dispatch(&self, action: SetAction<T>) -> Result<()> {
        let sink = match self.sink.upgrade() {
            Some(sink) if sink.is_live(self.instance) => sink,
            _ => {
                warn!(instance = %self.instance, "setter called after unmount");
                return Err(CoreError::StaleSetter {
                    instance: self.instance,
                });
            }
        };

        let next = match action {
            SetAction::Value(value) => value,
            SetAction::Update(f) => {
                // Clone out so `f` runs without holding the cell lock.
                let latest = self.cell.lock().latest().clone();
                f(&latest)
            }
        };
        self.cell.lock().pending = Some(next);

        sink.mark_dirty(self.instance)
    }

    /// Check whether updates are waiting for the next evaluation.
    pub fn has_pending(&self) -> bool {
        self.cell.lock().has_pending()
    }
}

impl<T> Clone for Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            instance: self.instance,
            cell: Arc::clone(&self.cell),
            sink: Weak::clone(&self.sink),
        }
    }
}

impl<T> fmt::Debug for Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("instance", &self.instance)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockSink {
        live: AtomicBool,
        marks: AtomicUsize,
    }

    impl MockSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                live: AtomicBool::new(true),
                marks: AtomicUsize::new(0),
            })
        }
    }

    impl DirtySink for MockSink {
        fn is_live(&self, _instance: InstanceId) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        fn mark_dirty(&self, _instance: InstanceId) -> Result<()> {
            self.marks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setter_with(sink: &Arc<MockSink>, initial: i32) -> (SharedCell<i32>, Setter<i32>) {
        let cell = Arc::new(Mutex::new(StateCell::new(initial)));
        let sink: Arc<dyn DirtySink> = sink.clone();
        let setter = Setter::new(InstanceId::new(), Arc::clone(&cell), Arc::downgrade(&sink));
        (cell, setter)
    }

    #[test]
    fn function_updates_see_latest_pending_value() {
        let sink = MockSink::new();
        let (cell, setter) = setter_with(&sink, 0);

        setter.update(|n| n + 1).unwrap();
        setter.update(|n| n + 1).unwrap();
        setter.update(|n| n + 1).unwrap();

        assert!(setter.has_pending());
        assert_eq!(cell.lock().commit(), 3);
        assert_eq!(sink.marks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn values_and_functions_interleave_in_call_order() {
        let sink = MockSink::new();
        let (cell, setter) = setter_with(&sink, 1);

        setter.update(|n| n * 10).unwrap();
        setter.set(5).unwrap();
        setter.update(|n| n + 2).unwrap();

        assert_eq!(cell.lock().commit(), 7);
    }

    #[test]
    fn commit_without_updates_keeps_value() {
        let mut cell = StateCell::new(String::from("Karan"));
        assert_eq!(cell.commit(), "Karan");
        assert_eq!(cell.commit(), "Karan");
    }

    #[test]
    fn stale_setter_is_rejected_without_mutation() {
        let sink = MockSink::new();
        let (cell, setter) = setter_with(&sink, 0);

        sink.live.store(false, Ordering::SeqCst);
        let err = setter.set(9).unwrap_err();

        assert!(matches!(err, CoreError::StaleSetter { .. }));
        assert!(!setter.has_pending());
        assert_eq!(cell.lock().commit(), 0);
        assert_eq!(sink.marks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_runtime_makes_setter_stale() {
        let sink = MockSink::new();
        let (_cell, setter) = setter_with(&sink, 0);

        drop(sink);
        assert!(matches!(
            setter.update(|n| n + 1),
            Err(CoreError::StaleSetter { .. })
        ));
    }

    #[test]
    fn clones_share_the_cell() {
        let sink = MockSink::new();
        let (cell, setter) = setter_with(&sink, 0);
        let other = setter.clone();

        setter.update(|n| n + 1).unwrap();
        other.update(|n| n + 1).unwrap();

        assert_eq!(cell.lock().commit(), 2);
        assert_eq!(setter.instance(), other.instance());
    }
}
