//! Cycle-guarded lazy walks over a [`TreeCollection`].

use ahash::AHashSet;
use std::iter::FusedIterator;
use tracing::warn;

use super::{TreeCollection, TreeNode};
use crate::error::{AclError, Result};
use crate::types::ObjectId;

/// Walk from a node's parent to the top of its chain.
///
/// Yields at most one error, then ends. A revisited node or a chain longer
/// than the collection's `max_depth` is reported as [`AclError::CycleDetected`].
pub struct Ancestors<'a, P> {
    tree: &'a TreeCollection<P>,
    origin: ObjectId,
    next: Option<ObjectId>,
    visited: AHashSet<ObjectId>,
    pending: Option<AclError>,
}

impl<'a, P> Ancestors<'a, P> {
    pub(super) fn new(tree: &'a TreeCollection<P>, id: ObjectId) -> Self {
        let mut visited = AHashSet::new();
        let (next, pending) = match tree.nodes.get(&id) {
            Some(node) => {
                visited.insert(id);
                (node.parent, None)
            }
            None => (None, Some(AclError::NodeNotFound(id))),
        };
        Self {
            tree,
            origin: id,
            next,
            visited,
            pending,
        }
    }
}

impl<'a, P> Iterator for Ancestors<'a, P> {
    type Item = Result<&'a TreeNode<P>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }
        let id = self.next.take()?;
        // visited holds the origin too, hence the +1
        if !self.visited.insert(id) || self.visited.len() > self.tree.max_depth + 1 {
            warn!(origin = self.origin, at = id, "parent chain cycles or exceeds depth bound");
            return Some(Err(AclError::CycleDetected { id: self.origin }));
        }
        let node = self.tree.nodes.get(&id)?;
        self.next = node.parent;
        Some(Ok(node))
    }
}

impl<P> FusedIterator for Ancestors<'_, P> {}

/// Pre-order walk below a node, yielding each node with its depth relative
/// to the start (children are depth 1).
pub(crate) struct DepthFirst<'a, P> {
    tree: &'a TreeCollection<P>,
    origin: ObjectId,
    stack: Vec<(ObjectId, usize)>,
    visited: AHashSet<ObjectId>,
    pending: Option<AclError>,
}

impl<'a, P> DepthFirst<'a, P> {
    pub(crate) fn new(tree: &'a TreeCollection<P>, id: ObjectId) -> Self {
        let mut visited = AHashSet::new();
        let (stack, pending) = match tree.nodes.get(&id) {
            Some(node) => {
                visited.insert(id);
                (node.children.iter().rev().map(|c| (*c, 1)).collect(), None)
            }
            None => (Vec::new(), Some(AclError::NodeNotFound(id))),
        };
        Self {
            tree,
            origin: id,
            stack,
            visited,
            pending,
        }
    }
}

impl<'a, P> Iterator for DepthFirst<'a, P> {
    type Item = Result<(&'a TreeNode<P>, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }
        loop {
            let (id, depth) = self.stack.pop()?;
            if !self.visited.insert(id) || depth > self.tree.max_depth {
                warn!(origin = self.origin, at = id, "child links cycle or exceed depth bound");
                self.stack.clear();
                return Some(Err(AclError::CycleDetected { id: self.origin }));
            }
            // Dangling child ids are reported by validate_integrity, not here.
            let Some(node) = self.tree.nodes.get(&id) else {
                continue;
            };
            self.stack
                .extend(node.children.iter().rev().map(|c| (*c, depth + 1)));
            return Some(Ok((node, depth)));
        }
    }
}

impl<P> FusedIterator for DepthFirst<'_, P> {}

/// Depth-first walk below a node. Finite even over malformed links.
pub struct Descendants<'a, P> {
    inner: DepthFirst<'a, P>,
}

impl<'a, P> Descendants<'a, P> {
    pub(super) fn new(tree: &'a TreeCollection<P>, id: ObjectId) -> Self {
        Self {
            inner: DepthFirst::new(tree, id),
        }
    }
}

impl<'a, P> Iterator for Descendants<'a, P> {
    type Item = Result<&'a TreeNode<P>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| item.map(|(node, _)| node))
    }
}

impl<P> FusedIterator for Descendants<'_, P> {}
