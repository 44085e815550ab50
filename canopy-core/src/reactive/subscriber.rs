//! Dirty listeners for the rendering host.
//!
//! The runtime never flushes on its own. Instead it tells the host "there is
//! work" through these listeners, once per transition of the dirty queue
//! from empty to non-empty, and the host decides when to call
//! [`Runtime::flush`](super::Runtime::flush).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::InstanceId;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback invoked with the instance whose mark made the queue non-empty.
pub type DirtyCallback = Arc<dyn Fn(InstanceId) + Send + Sync>;

/// Registry of host callbacks.
#[derive(Default)]
pub struct DirtyListeners {
    listeners: Mutex<Vec<(ListenerId, DirtyCallback)>>,
}

impl DirtyListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn add<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(InstanceId) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Invoke every callback.
    ///
    /// The list is snapshotted first, so a callback may add or remove
    /// listeners without deadlocking.
    pub fn notify(&self, instance: InstanceId) {
        let snapshot: Vec<DirtyCallback> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            callback(instance);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listener_ids_are_unique() {
        let id1 = ListenerId::new();
        let id2 = ListenerId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn notify_calls_every_listener() {
        let listeners = DirtyListeners::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            listeners.add(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        listeners.notify(InstanceId::new());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn removed_listener_is_silent() {
        let listeners = DirtyListeners::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let id = listeners.add(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));

        listeners.notify(InstanceId::new());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(listeners.is_empty());
    }
}
