//! Instance Nodes
//!
//! This module defines the entries that live in the instance arena.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use smallvec::SmallVec;

/// Unique identifier for a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Generate a new unique instance ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling state of an instance.
///
/// The only legal cycle is `Clean -> Dirty -> Evaluating -> Clean`. A mark
/// that arrives while `Evaluating` does not change the state; the scheduler
/// queues the instance for the next pass instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Output reflects all committed state.
    Clean,

    /// Waiting in the scheduler queue.
    Dirty,

    /// The evaluation function is running right now.
    Evaluating,
}

/// Result of marking a node dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The node was clean and must be queued.
    Queued,

    /// The node was already waiting in a queue.
    AlreadyDirty,

    /// The node is mid-evaluation; it goes back to `Dirty` when it finishes.
    DuringEvaluation,
}

/// Child list; most instances have only a handful.
pub type Children = SmallVec<[InstanceId; 4]>;

/// A node in the instance tree.
#[derive(Debug)]
pub struct InstanceNode {
    /// Unique identifier for this node.
    id: InstanceId,

    /// Enclosing instance, `None` for roots.
    parent: Option<InstanceId>,

    /// Children in declaration order.
    children: Children,

    /// Distance from the root; roots have depth 0.
    depth: usize,

    /// Current scheduling state.
    dirty: DirtyState,

    /// Set when a mark arrives during evaluation.
    redirtied: bool,
}

impl InstanceNode {
    /// Create a node under `parent` at the given depth.
    ///
    /// New nodes start dirty: they have never been evaluated.
    pub fn new(parent: Option<InstanceId>, depth: usize) -> Self {
        Self {
            id: InstanceId::new(),
            parent,
            children: Children::new(),
            depth,
            dirty: DirtyState::Dirty,
            redirtied: false,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub(crate) fn push_child(&mut self, child: InstanceId) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: InstanceId) {
        self.children.retain(|c| *c != child);
    }

    /// Replace the child order, used after keyed reconciliation.
    pub(crate) fn set_children(&mut self, children: Children) {
        self.children = children;
    }

    /// Get the current dirty state.
    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    /// Mark the node dirty.
    pub fn mark_dirty(&mut self) -> MarkOutcome {
        match self.dirty {
            DirtyState::Clean => {
                self.dirty = DirtyState::Dirty;
                MarkOutcome::Queued
            }
            DirtyState::Dirty => MarkOutcome::AlreadyDirty,
            DirtyState::Evaluating => {
                self.redirtied = true;
                MarkOutcome::DuringEvaluation
            }
        }
    }

    /// Enter evaluation.
    pub fn begin_evaluation(&mut self) {
        self.dirty = DirtyState::Evaluating;
        self.redirtied = false;
    }

    /// Leave evaluation.
    ///
    /// Returns `true` if the node was marked again while evaluating and is
    /// therefore dirty once more.
    pub fn finish_evaluation(&mut self) -> bool {
        if std::mem::take(&mut self.redirtied) {
            self.dirty = DirtyState::Dirty;
            true
        } else {
            self.dirty = DirtyState::Clean;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique() {
        let id1 = InstanceId::new();
        let id2 = InstanceId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn new_node_starts_dirty() {
        let node = InstanceNode::new(None, 0);
        assert_eq!(node.dirty_state(), DirtyState::Dirty);
        assert!(node.parent().is_none());
    }

    #[test]
    fn dirty_state_cycle() {
        let mut node = InstanceNode::new(None, 0);

        node.begin_evaluation();
        assert_eq!(node.dirty_state(), DirtyState::Evaluating);
        assert!(!node.finish_evaluation());
        assert!(node.is_clean());

        assert_eq!(node.mark_dirty(), MarkOutcome::Queued);
        assert_eq!(node.mark_dirty(), MarkOutcome::AlreadyDirty);
        assert_eq!(node.dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn mark_during_evaluation_redirties_on_finish() {
        let mut node = InstanceNode::new(None, 0);

        node.begin_evaluation();
        assert_eq!(node.mark_dirty(), MarkOutcome::DuringEvaluation);
        assert_eq!(node.dirty_state(), DirtyState::Evaluating);

        assert!(node.finish_evaluation());
        assert_eq!(node.dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn child_management() {
        let mut node = InstanceNode::new(None, 0);
        let a = InstanceId::new();
        let b = InstanceId::new();

        node.push_child(a);
        node.push_child(b);
        assert_eq!(node.children(), &[a, b]);

        node.remove_child(a);
        assert_eq!(node.children(), &[b]);
    }
}
