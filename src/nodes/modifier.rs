//! Structural mutation of one target node.
//!
//! Content nodes are never moved: every operation inserts deep clones and
//! returns them, so the same content can be applied to many targets.
//! Operations that need a parent do nothing on a detached target.

use tracing::trace;

use crate::tree::{NodeId, SharedDocument};

/// Mutation primitives against one target node.
#[derive(Debug, Clone)]
pub struct Modifier<'a> {
    document: &'a SharedDocument,
    target: NodeId,
}

impl<'a> Modifier<'a> {
    /// Creates a modifier for `target` within `document`.
    #[must_use]
    pub fn new(document: &'a SharedDocument, target: NodeId) -> Self {
        Self { document, target }
    }

    /// Appends clones of `content` to the target's children. Does nothing
    /// unless the target is an element.
    pub fn append_children(&self, content: &[NodeId]) -> Vec<NodeId> {
        let mut doc = self.document.borrow_mut();
        if !doc.is_element(self.target) {
            return Vec::new();
        }
        content
            .iter()
            .map(|&node| {
                let copy = doc.clone_node(node, true);
                doc.append_child(self.target, copy);
                copy
            })
            .collect()
    }

    /// Removes the target's children, then appends clones of `content`.
    pub fn replace_children(&self, content: &[NodeId]) -> Vec<NodeId> {
        {
            let mut doc = self.document.borrow_mut();
            if doc.is_element(self.target) {
                doc.remove_children(self.target);
            } else {
                doc.set_node_text(self.target, "");
            }
        }
        self.append_children(content)
    }

    /// Inserts clones of `content` before the target's first child, or
    /// appends them when it has none.
    pub fn insert_children_before(&self, content: &[NodeId]) -> Vec<NodeId> {
        let first = self.document.borrow().first_child(self.target);
        match first {
            Some(first) => Modifier::new(self.document, first).insert_nodes_before(content),
            None => self.append_children(content),
        }
    }

    /// Inserts clones of `content` after the target, in order.
    pub fn insert_nodes_after(&self, content: &[NodeId]) -> Vec<NodeId> {
        let mut doc = self.document.borrow_mut();
        let Some(parent) = doc.parent(self.target) else {
            trace!(target = ?self.target, "insert after detached node skipped");
            return Vec::new();
        };
        let anchor = doc.next_sibling(self.target);
        content
            .iter()
            .map(|&node| {
                let copy = doc.clone_node(node, true);
                match anchor {
                    Some(anchor) => doc.insert_before(anchor, copy),
                    None => doc.append_child(parent, copy),
                }
                copy
            })
            .collect()
    }

    /// Inserts clones of `content` before the target, in order.
    pub fn insert_nodes_before(&self, content: &[NodeId]) -> Vec<NodeId> {
        let mut doc = self.document.borrow_mut();
        if doc.parent(self.target).is_none() {
            trace!(target = ?self.target, "insert before detached node skipped");
            return Vec::new();
        }
        content
            .iter()
            .map(|&node| {
                let copy = doc.clone_node(node, true);
                doc.insert_before(self.target, copy);
                copy
            })
            .collect()
    }

    /// Inserts clones of `content` before the target, then detaches and
    /// returns the target.
    pub fn replace_node(&self, content: &[NodeId]) -> Option<NodeId> {
        self.document.borrow().parent(self.target)?;
        self.insert_nodes_before(content);
        self.document.borrow_mut().detach(self.target);
        Some(self.target)
    }
}
