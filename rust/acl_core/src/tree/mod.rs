//! Tree assembly over an id-indexed arena.
//!
//! [`TreeCollection`] owns every node exclusively. Parent and child links are
//! stored as ids and resolved through the arena, so the node graph never forms
//! an ownership cycle even when a malformed feed describes a logical one.
//! Logical cycles are caught by the visited-set guard in [`Ancestors`] and
//! [`Descendants`].
//!
//! Nodes may arrive in any order: a node whose parent is not loaded yet is
//! parked as an orphan and adopted as soon as the parent shows up.
//!
//! ```text
//!   add(5, parent=3)   roots=[]   orphans=[5]
//!   add(3)             roots=[3]  orphans=[]   3.children=[5]
//! ```

mod integrity;
mod traverse;
pub mod typed;

#[cfg(test)]
mod tests;

use ahash::AHashMap;
use tracing::{debug, trace, warn};

use crate::config::{AclConfig, DEFAULT_MAX_TREE_DEPTH};
use crate::error::{AclError, Result};
use crate::source::NodeSource;
use crate::types::ObjectId;

pub use integrity::{IntegrityIssue, TreeStats, ORPHAN_LEVEL};
pub use traverse::{Ancestors, Descendants};
pub use typed::{DynPayload, TypedTreeCollection};

/// A node supplied by the caller. Links are owned by the collection.
#[derive(Debug, Clone)]
pub struct TreeNode<P> {
    id: ObjectId,
    parent_id: Option<ObjectId>,
    /// Resolved parent link; `None` for roots and orphans.
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    payload: P,
}

impl<P> TreeNode<P> {
    pub fn new(id: ObjectId, parent_id: Option<ObjectId>, payload: P) -> Self {
        Self {
            id,
            parent_id,
            parent: None,
            children: Vec::new(),
            payload,
        }
    }

    pub fn root(id: ObjectId, payload: P) -> Self {
        Self::new(id, None, payload)
    }

    pub fn child(id: ObjectId, parent_id: ObjectId, payload: P) -> Self {
        Self::new(id, Some(parent_id), payload)
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Declared parent id, as supplied by the caller.
    pub fn parent_id(&self) -> Option<ObjectId> {
        self.parent_id
    }

    /// Parent link resolved by the collection.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut P {
        &mut self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Order-independent tree builder with orphan tracking.
///
/// Not safe for concurrent mutation; `&mut self` on [`add`](Self::add) and
/// [`remove`](Self::remove) makes that a compile-time property. Once built,
/// the collection can be shared read-only.
#[derive(Debug, Clone)]
pub struct TreeCollection<P> {
    nodes: AHashMap<ObjectId, TreeNode<P>>,
    roots: Vec<ObjectId>,
    orphans: Vec<ObjectId>,
    max_depth: usize,
}

impl<P> Default for TreeCollection<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TreeCollection<P> {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_TREE_DEPTH)
    }

    /// Create a collection whose walks give up after `max_depth` hops.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            nodes: AHashMap::new(),
            roots: Vec::new(),
            orphans: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    pub fn from_config(config: &AclConfig) -> Self {
        Self::with_max_depth(config.max_tree_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert a node, linking it to its parent or parking it as an orphan,
    /// then adopt any orphans that were waiting for it.
    pub fn add(&mut self, mut node: TreeNode<P>) -> Result<()> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            warn!(id, "rejecting duplicate node id");
            return Err(AclError::DuplicateId(id));
        }
        if node.parent_id == Some(id) {
            return Err(AclError::InvalidArgument(format!(
                "node {id} names itself as its parent"
            )));
        }

        // Links from a node cloned out of another collection are not ours.
        node.parent = None;
        node.children.clear();

        match node.parent_id {
            None => self.roots.push(id),
            Some(parent_id) => match self.nodes.get_mut(&parent_id) {
                Some(parent) => {
                    parent.children.push(id);
                    node.parent = Some(parent_id);
                }
                None => {
                    trace!(id, parent_id, "parent not loaded, node parked as orphan");
                    self.orphans.push(id);
                }
            },
        }

        self.nodes.insert(id, node);
        self.adopt_orphans_of(id);
        Ok(())
    }

    /// Add nodes in order. Stops at the first failure; nodes added before it
    /// stay in the collection.
    pub fn add_range<I>(&mut self, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = TreeNode<P>>,
    {
        for node in nodes {
            self.add(node)?;
        }
        Ok(())
    }

    fn adopt_orphans_of(&mut self, parent_id: ObjectId) {
        let nodes = &self.nodes;
        let (adopted, remaining): (Vec<ObjectId>, Vec<ObjectId>) =
            self.orphans.iter().copied().partition(|orphan_id| {
                nodes.get(orphan_id).and_then(|n| n.parent_id) == Some(parent_id)
            });
        if adopted.is_empty() {
            return;
        }
        self.orphans = remaining;

        for orphan_id in &adopted {
            if let Some(orphan) = self.nodes.get_mut(orphan_id) {
                orphan.parent = Some(parent_id);
            }
        }
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children.extend(adopted.iter().copied());
        }
        trace!(parent_id, adopted = adopted.len(), "orphans adopted");
    }

    /// Remove a node. Its children become orphans; they are not deleted.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.take(id).is_some()
    }

    /// Remove a node and hand it back with its links cleared.
    pub fn take(&mut self, id: ObjectId) -> Option<TreeNode<P>> {
        let mut node = self.nodes.remove(&id)?;

        if let Some(parent_id) = node.parent {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| *c != id);
            }
        }
        self.roots.retain(|r| *r != id);
        self.orphans.retain(|o| *o != id);

        let mut orphaned = 0usize;
        for child_id in node.children.drain(..) {
            if let Some(child) = self.nodes.get_mut(&child_id) {
                child.parent = None;
                self.orphans.push(child_id);
                orphaned += 1;
            }
        }
        node.parent = None;

        if orphaned > 0 {
            debug!(id, orphaned, "removed node, children orphaned");
        }
        Some(node)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.orphans.clear();
    }

    /// Populate the collection from a node source, returning how many nodes
    /// were added. Source errors pass through unchanged.
    pub fn load_from<S>(&mut self, source: &S, root_id: ObjectId) -> Result<usize>
    where
        S: NodeSource<P> + ?Sized,
    {
        let nodes = source.load_nodes(root_id).map_err(AclError::from_source)?;
        let count = nodes.len();
        self.add_range(nodes)?;
        debug!(root_id, count, "tree populated from source");
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn get(&self, id: ObjectId) -> Option<&TreeNode<P>> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node's payload. Links stay read-only.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut P> {
        self.nodes.get_mut(&id).map(|n| &mut n.payload)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode<P>> + '_ {
        self.nodes.values()
    }

    /// Root nodes in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode<P>> + '_ {
        self.roots.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn root_ids(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Orphans in the order they were parked.
    pub fn orphans(&self) -> impl Iterator<Item = &TreeNode<P>> + '_ {
        self.orphans.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn orphan_ids(&self) -> &[ObjectId] {
        &self.orphans
    }

    pub fn is_orphan(&self, id: ObjectId) -> bool {
        self.orphans.contains(&id)
    }

    /// Nodes without children, sorted by id.
    pub fn leaves(&self) -> Vec<&TreeNode<P>> {
        let mut leaves: Vec<&TreeNode<P>> = self.nodes.values().filter(|n| n.is_leaf()).collect();
        leaves.sort_by_key(|n| n.id);
        leaves
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<&TreeNode<P>> {
        self.nodes
            .get(&id)
            .and_then(|n| n.parent)
            .and_then(|pid| self.nodes.get(&pid))
    }

    pub fn children_of(&self, id: ObjectId) -> impl Iterator<Item = &TreeNode<P>> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(move |n| n.children.iter().filter_map(move |c| self.nodes.get(c)))
    }

    /// Nodes sharing this node's parent. Roots are siblings of each other;
    /// orphans are siblings when they wait for the same parent id.
    pub fn siblings_of(&self, id: ObjectId) -> Vec<&TreeNode<P>> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        match (node.parent, node.parent_id) {
            (Some(parent_id), _) => self
                .children_of(parent_id)
                .filter(|n| n.id != id)
                .collect(),
            (None, None) => self.roots().filter(|n| n.id != id).collect(),
            (None, Some(parent_id)) => self
                .orphans()
                .filter(|n| n.id != id && n.parent_id == Some(parent_id))
                .collect(),
        }
    }

    /// Nodes whose payload matches `predicate`, sorted by id.
    pub fn find<F>(&self, predicate: F) -> Vec<&TreeNode<P>>
    where
        F: Fn(&P) -> bool,
    {
        let mut found: Vec<&TreeNode<P>> = self
            .nodes
            .values()
            .filter(|n| predicate(&n.payload))
            .collect();
        found.sort_by_key(|n| n.id);
        found
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Lazy walk from the parent up to the top of the chain.
    pub fn ancestors(&self, id: ObjectId) -> Ancestors<'_, P> {
        Ancestors::new(self, id)
    }

    /// Lazy depth-first (pre-order) walk below `id`. Each call starts fresh.
    pub fn descendants(&self, id: ObjectId) -> Descendants<'_, P> {
        Descendants::new(self, id)
    }

    /// Number of parent hops to the top of the loaded chain: 0 for roots and
    /// for orphans, whose parent is not loaded. This is distance within the
    /// collection, not depth in the full hierarchy; see
    /// [`flattened_with_levels`](Self::flattened_with_levels), which tags
    /// orphan subtrees with [`ORPHAN_LEVEL`] instead.
    pub fn level(&self, id: ObjectId) -> Result<usize> {
        let mut level = 0;
        for ancestor in self.ancestors(id) {
            ancestor?;
            level += 1;
        }
        Ok(level)
    }

    /// `[id, parent, grandparent, …]` up to the top of the chain.
    pub fn ancestor_path(&self, id: ObjectId) -> Result<Vec<ObjectId>> {
        let mut path = vec![id];
        for ancestor in self.ancestors(id) {
            path.push(ancestor?.id);
        }
        Ok(path)
    }

    /// Nodes from the top of the chain down to `id` inclusive.
    pub fn path_from_root(&self, id: ObjectId) -> Result<Vec<&TreeNode<P>>> {
        let node = self.nodes.get(&id).ok_or(AclError::NodeNotFound(id))?;
        let mut path = vec![node];
        for ancestor in self.ancestors(id) {
            path.push(ancestor?);
        }
        path.reverse();
        Ok(path)
    }

    /// `id` followed by all of its descendants, depth-first.
    pub fn subtree(&self, id: ObjectId) -> Result<Vec<&TreeNode<P>>> {
        let node = self.nodes.get(&id).ok_or(AclError::NodeNotFound(id))?;
        let mut out = vec![node];
        for descendant in self.descendants(id) {
            out.push(descendant?);
        }
        Ok(out)
    }

    /// Nodes at `level` below some root, in depth-first order.
    pub fn nodes_at_level(&self, level: usize) -> Vec<&TreeNode<P>> {
        self.walk_roots()
            .filter(|(_, l)| *l == level)
            .map(|(n, _)| n)
            .collect()
    }

    /// Every root subtree depth-first with its level.
    pub(crate) fn walk_roots(&self) -> impl Iterator<Item = (&TreeNode<P>, usize)> + '_ {
        self.roots().flat_map(move |root| {
            std::iter::once((root, 0)).chain(
                traverse::DepthFirst::new(self, root.id).map_while(move |item| match item {
                    Ok(pair) => Some(pair),
                    Err(err) => {
                        warn!(root = root.id, error = %err, "stopping walk below root");
                        None
                    }
                }),
            )
        })
    }
}
