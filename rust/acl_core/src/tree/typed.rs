//! Strongly typed facade over a heterogeneous [`TreeCollection`].
//!
//! Loaders that mix object kinds in one tree store payloads as
//! [`DynPayload`]. [`TypedTreeCollection<T>`] gives call sites typed access
//! by downcasting and skipping nodes of other types; linking, orphan
//! handling and cycle guards are the inner collection's, unchanged.

use std::any::Any;
use std::marker::PhantomData;

use super::{IntegrityIssue, TreeCollection, TreeNode, TreeStats};
use crate::error::Result;
use crate::types::ObjectId;

/// Type-erased node payload.
pub type DynPayload = Box<dyn Any + Send + Sync>;

pub struct TypedTreeCollection<T> {
    inner: TreeCollection<DynPayload>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Default for TypedTreeCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<T: Any>(node: &TreeNode<DynPayload>) -> Option<(ObjectId, &T)> {
    node.payload().downcast_ref::<T>().map(|p| (node.id(), p))
}

impl<T: Any + Send + Sync> TypedTreeCollection<T> {
    pub fn new() -> Self {
        Self::wrap(TreeCollection::new())
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self::wrap(TreeCollection::with_max_depth(max_depth))
    }

    /// View an existing heterogeneous collection through `T`.
    pub fn wrap(inner: TreeCollection<DynPayload>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn inner(&self) -> &TreeCollection<DynPayload> {
        &self.inner
    }

    pub fn into_inner(self) -> TreeCollection<DynPayload> {
        self.inner
    }

    pub fn add(&mut self, id: ObjectId, parent_id: Option<ObjectId>, payload: T) -> Result<()> {
        self.inner.add(TreeNode::new(id, parent_id, Box::new(payload)))
    }

    pub fn add_range<I>(&mut self, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = (ObjectId, Option<ObjectId>, T)>,
    {
        for (id, parent_id, payload) in nodes {
            self.add(id, parent_id, payload)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: ObjectId) -> bool {
        self.inner.remove(id)
    }

    /// Typed payload, or `None` when absent or of another type.
    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.inner.get(id).and_then(downcast::<T>).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut T> {
        self.inner
            .get_mut(id)
            .and_then(|p| p.downcast_mut::<T>())
    }

    pub fn node(&self, id: ObjectId) -> Option<&TreeNode<DynPayload>> {
        self.inner.get(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Number of nodes carrying a `T` payload.
    pub fn len(&self) -> usize {
        self.inner.nodes().filter_map(downcast::<T>).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn roots(&self) -> impl Iterator<Item = (ObjectId, &T)> + '_ {
        self.inner.roots().filter_map(downcast::<T>)
    }

    pub fn orphans(&self) -> impl Iterator<Item = (ObjectId, &T)> + '_ {
        self.inner.orphans().filter_map(downcast::<T>)
    }

    pub fn children_of(&self, id: ObjectId) -> impl Iterator<Item = (ObjectId, &T)> + '_ {
        self.inner.children_of(id).filter_map(downcast::<T>)
    }

    pub fn parent_of(&self, id: ObjectId) -> Option<(ObjectId, &T)> {
        self.inner.parent_of(id).and_then(downcast::<T>)
    }

    pub fn level(&self, id: ObjectId) -> Result<usize> {
        self.inner.level(id)
    }

    /// Ancestors carrying a `T` payload, nearest first.
    pub fn ancestors(&self, id: ObjectId) -> Result<Vec<(ObjectId, &T)>> {
        let mut out = Vec::new();
        for ancestor in self.inner.ancestors(id) {
            if let Some(pair) = downcast::<T>(ancestor?) {
                out.push(pair);
            }
        }
        Ok(out)
    }

    /// Descendants carrying a `T` payload, depth-first.
    pub fn descendants(&self, id: ObjectId) -> Result<Vec<(ObjectId, &T)>> {
        let mut out = Vec::new();
        for descendant in self.inner.descendants(id) {
            if let Some(pair) = downcast::<T>(descendant?) {
                out.push(pair);
            }
        }
        Ok(out)
    }

    pub fn flattened_with_levels(&self) -> Vec<(ObjectId, &T, i64)> {
        self.inner
            .flattened_with_levels()
            .into_iter()
            .filter_map(|(node, level)| downcast::<T>(node).map(|(id, p)| (id, p, level)))
            .collect()
    }

    pub fn stats(&self) -> TreeStats {
        self.inner.stats()
    }

    pub fn validate_integrity(&self) -> Vec<IntegrityIssue> {
        self.inner.validate_integrity()
    }
}
