//! Update Scheduler
//!
//! The scheduler determines the order in which dirty instances are
//! re-evaluated. It ensures that parents are always evaluated before their
//! children, so a parent can change which children exist before any child
//! runs.
//!
//! # Algorithm
//!
//! Work is split into passes:
//!
//! 1. Setter calls between flushes enqueue their owner into the current pass
//! 2. A flush pops instances in `(depth, mark order)` order; each instance is
//!    evaluated at most once per pass
//! 3. An instance marked while it is evaluating, or after it already ran in
//!    this pass, goes to the next pass instead of being re-entered
//! 4. Unmounted instances are removed from both queues and never evaluated
//! 5. When the current pass drains, the next pass is promoted and the loop
//!    continues until both queues are empty
//!
//! Self-requeues are counted per instance so the runtime can abort a flush
//! that is stuck in a dependency cycle.

use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;

use super::node::InstanceId;

/// Ordering key within one pass: shallower first, then by mark order.
type QueueKey = (usize, u64, InstanceId);

/// The update scheduler holds the dirty queues for the current and next pass.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// Instances waiting in the current pass.
    current: BTreeSet<QueueKey>,

    /// Reverse index into `current`, for removal by ID.
    keys: HashMap<InstanceId, QueueKey>,

    /// Instances deferred to the next pass, with their depth.
    next: IndexMap<InstanceId, usize>,

    /// Instances already evaluated in the current pass.
    evaluated: HashSet<InstanceId>,

    /// How often each instance re-dirtied itself during this flush.
    reentrant: HashMap<InstanceId, usize>,

    /// Monotonic counter giving the mark order.
    sequence: u64,

    /// Number of the pass in progress (0 when idle).
    pass: usize,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an instance.
    ///
    /// `during_evaluation` is true when the instance is the one currently
    /// running; it is then deferred to the next pass and counted as a
    /// re-entry. Returns `true` if both queues were empty before the call.
    pub fn enqueue(&mut self, id: InstanceId, depth: usize, during_evaluation: bool) -> bool {
        let was_idle = self.is_empty();

        if during_evaluation {
            *self.reentrant.entry(id).or_insert(0) += 1;
            self.next.insert(id, depth);
        } else if self.evaluated.contains(&id) {
            self.next.insert(id, depth);
        } else if !self.keys.contains_key(&id) {
            self.sequence += 1;
            let key = (depth, self.sequence, id);
            self.current.insert(key);
            self.keys.insert(id, key);
        }

        was_idle
    }

    /// Pop the next instance of the current pass.
    pub fn pop(&mut self) -> Option<InstanceId> {
        let key = self.current.pop_first()?;
        let id = key.2;
        self.keys.remove(&id);
        self.evaluated.insert(id);
        Some(id)
    }

    /// Promote the next pass once the current one is drained.
    ///
    /// Returns `false` if there is nothing left to do.
    pub fn advance_pass(&mut self) -> bool {
        if !self.current.is_empty() {
            return true;
        }
        if self.next.is_empty() {
            return false;
        }

        self.evaluated.clear();
        self.pass += 1;
        for (id, depth) in std::mem::take(&mut self.next) {
            self.sequence += 1;
            let key = (depth, self.sequence, id);
            self.current.insert(key);
            self.keys.insert(id, key);
        }
        true
    }

    /// Start a flush.
    pub fn begin_flush(&mut self) {
        self.pass = 1;
        self.evaluated.clear();
        self.reentrant.clear();
    }

    /// Finish a flush, keeping any work that is still queued.
    pub fn end_flush(&mut self) {
        self.pass = 0;
        self.evaluated.clear();
        self.reentrant.clear();
    }

    /// Drop an instance from every queue.
    pub fn remove(&mut self, id: InstanceId) {
        if let Some(key) = self.keys.remove(&id) {
            self.current.remove(&key);
        }
        self.next.shift_remove(&id);
        self.evaluated.remove(&id);
        self.reentrant.remove(&id);
    }

    /// The instance `pop` would return next, without removing it.
    pub fn peek(&self) -> Option<InstanceId> {
        self.current.first().map(|key| key.2)
    }

    /// Check whether an instance waits in either queue.
    pub fn is_queued(&self, id: InstanceId) -> bool {
        self.keys.contains_key(&id) || self.next.contains_key(&id)
    }

    /// First instance whose self-requeue count exceeds `limit`.
    pub fn reentrant_overflow(&self, limit: usize) -> Option<(InstanceId, usize)> {
        self.reentrant
            .iter()
            .filter(|(_, count)| **count > limit)
            .map(|(id, count)| (*id, *count))
            .min_by_key(|(id, _)| *id)
    }

    pub fn pass(&self) -> usize {
        self.pass
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.next.is_empty()
    }

    /// Number of instances waiting across both queues.
    pub fn len(&self) -> usize {
        self.current.len() + self.next.len()
    }
}
