//! Instance Tree
//!
//! Arena of mounted instances linked by parent pointers. The rendering host
//! owns the shape of the tree; the runtime only asks it two kinds of
//! questions: "who are my ancestors" (context resolution) and "what is below
//! me" (unmounting).

use std::collections::HashMap;

use super::node::{InstanceId, InstanceNode};
use crate::error::{CoreError, Result};

/// Arena of instance nodes, indexed by ID.
#[derive(Debug, Default)]
pub struct InstanceTree {
    nodes: HashMap<InstanceId, InstanceNode>,
}

impl InstanceTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    /// Insert a new node under `parent` (or as a root).
    pub fn insert(&mut self, parent: Option<InstanceId>) -> Result<InstanceId> {
        let depth = match parent {
            Some(parent_id) => {
                let parent_node = self
                    .nodes
                    .get(&parent_id)
                    .ok_or(CoreError::UnknownInstance(parent_id))?;
                parent_node.depth() + 1
            }
            None => 0,
        };

        let node = InstanceNode::new(parent, depth);
        let id = node.id();
        self.nodes.insert(id, node);

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.push_child(id);
            }
        }

        Ok(id)
    }

    /// Remove a node and everything below it.
    ///
    /// Returns the removed IDs in post-order (children before parents), which
    /// is the order teardown callbacks must run in.
    pub fn remove_subtree(&mut self, id: InstanceId) -> Result<Vec<InstanceId>> {
        let parent = self
            .nodes
            .get(&id)
            .ok_or(CoreError::UnknownInstance(id))?
            .parent();

        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.remove_child(id);
            }
        }

        let order = self.post_order(id);
        for removed in &order {
            self.nodes.remove(removed);
        }
        Ok(order)
    }

    /// Collect `id` and its descendants in post-order.
    pub fn post_order(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut out = Vec::new();
        // (node, children already expanded)
        let mut stack = vec![(id, false)];

        while let Some((node_id, expanded)) = stack.pop() {
            if expanded {
                out.push(node_id);
                continue;
            }
            if let Some(node) = self.nodes.get(&node_id) {
                stack.push((node_id, true));
                for child in node.children().iter().rev() {
                    stack.push((*child, false));
                }
            }
        }

        out
    }

    /// Iterate over the ancestors of `id`, nearest first. `id` itself is
    /// not included.
    pub fn ancestors(&self, id: InstanceId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes.get(&id).and_then(InstanceNode::parent),
        }
    }

    /// Check whether `ancestor` encloses `id`.
    pub fn is_ancestor(&self, ancestor: InstanceId, id: InstanceId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut InstanceNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get the total number of mounted instances.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Iterator returned by [`InstanceTree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a InstanceTree,
    next: Option<InstanceId>,
}

impl Iterator for Ancestors<'_> {
    type Item = InstanceId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.get(current).and_then(InstanceNode::parent);
        Some(current)
    }
}
