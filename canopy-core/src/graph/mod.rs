//! Instance Graph
//!
//! This module implements the topology the reactive runtime schedules over.
//!
//! # Overview
//!
//! Mounted component instances form a tree:
//!
//! - Nodes are instances, each with a parent pointer and an ordered child list
//! - Depth is fixed at mount time and drives parent-before-child ordering
//!
//! When state changes, the owning instance is queued in the
//! [`UpdateScheduler`]. A flush drains the queue pass by pass, always taking
//! the shallowest instance first, so a parent can unmount a child before the
//! child is evaluated.
//!
//! # Design Decisions
//!
//! 1. The tree is an arena indexed by ID rather than linked `Rc` nodes:
//!    - Context lookup is a walk over parent IDs
//!    - Unmounting a subtree never fights the borrow checker
//!
//! 2. The scheduler does not own the tree. It only needs depths, which the
//!    runtime passes in when it queues an instance.

mod node;
mod scheduler;
mod tree;

pub use node::{Children, DirtyState, InstanceId, InstanceNode, MarkOutcome};
pub use scheduler::UpdateScheduler;
pub use tree::{Ancestors, InstanceTree};
