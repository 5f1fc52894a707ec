//! In-memory collaborators for embedding and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;

use super::{AncestorPath, GrantSource, NodeSource, RoleMembership, SourceResult};
use crate::error::Result;
use crate::permission::GrantRecord;
use crate::tree::TreeNode;
use crate::types::{ObjectId, RoleId, SchemeId, UserId, GLOBAL_TARGET};

// ============================================================================
// Nodes
// ============================================================================

/// Fixed set of node rows, served by subtree.
#[derive(Debug, Clone)]
pub struct MemoryNodeSource<P> {
    rows: Vec<TreeNode<P>>,
}

impl<P> Default for MemoryNodeSource<P> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<P> MemoryNodeSource<P> {
    pub fn new(rows: Vec<TreeNode<P>>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: TreeNode<P>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<P: Clone> NodeSource<P> for MemoryNodeSource<P> {
    /// Rows of `root_id` and everything declared below it, in stored order.
    /// [`GLOBAL_TARGET`] returns every row.
    fn load_nodes(&self, root_id: ObjectId) -> SourceResult<Vec<TreeNode<P>>> {
        if root_id == GLOBAL_TARGET {
            return Ok(self.rows.clone());
        }

        let mut by_parent: AHashMap<ObjectId, Vec<ObjectId>> = AHashMap::new();
        for row in &self.rows {
            if let Some(parent_id) = row.parent_id() {
                by_parent.entry(parent_id).or_default().push(row.id());
            }
        }

        let mut wanted = AHashSet::new();
        let mut stack = vec![root_id];
        while let Some(id) = stack.pop() {
            if !wanted.insert(id) {
                continue;
            }
            if let Some(children) = by_parent.get(&id) {
                stack.extend(children.iter().copied());
            }
        }

        Ok(self
            .rows
            .iter()
            .filter(|row| wanted.contains(&row.id()))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Grants
// ============================================================================

/// Grant rows indexed by object, scheme and global scope.
///
/// Interior mutability lets grants change while a resolver holds the store;
/// callers invalidate the permission cache afterwards.
#[derive(Debug, Default)]
pub struct MemoryGrantStore {
    objects: RwLock<AHashMap<ObjectId, Vec<GrantRecord>>>,
    schemes: RwLock<AHashMap<SchemeId, Vec<GrantRecord>>>,
    global: RwLock<Vec<GrantRecord>>,
    lookups: AtomicU64,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a grant on the object named by `record.target_ref`.
    pub fn add_object_grant(&self, record: GrantRecord) {
        self.objects
            .write()
            .entry(record.target_ref)
            .or_default()
            .push(record);
    }

    /// Store a grant on the scheme named by `record.target_ref`.
    pub fn add_scheme_grant(&self, record: GrantRecord) {
        self.schemes
            .write()
            .entry(record.target_ref)
            .or_default()
            .push(record);
    }

    pub fn add_global_grant(&self, mut record: GrantRecord) {
        record.target_ref = GLOBAL_TARGET;
        self.global.write().push(record);
    }

    /// Drop every grant on an object, returning how many were removed.
    pub fn revoke_object_grants(&self, object_id: ObjectId) -> usize {
        self.objects
            .write()
            .remove(&object_id)
            .map_or(0, |grants| grants.len())
    }

    /// Number of lookups served so far, across all scopes.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }
}

impl GrantSource for MemoryGrantStore {
    fn object_grants(&self, object_id: ObjectId) -> SourceResult<Vec<GrantRecord>> {
        self.count();
        Ok(self.objects.read().get(&object_id).cloned().unwrap_or_default())
    }

    fn scheme_grants(&self, scheme_id: SchemeId) -> SourceResult<Vec<GrantRecord>> {
        self.count();
        Ok(self.schemes.read().get(&scheme_id).cloned().unwrap_or_default())
    }

    fn global_grants(&self) -> SourceResult<Vec<GrantRecord>> {
        self.count();
        Ok(self.global.read().clone())
    }
}

// ============================================================================
// Roles
// ============================================================================

/// User → roles, kept in assignment order.
#[derive(Debug, Default)]
pub struct MemoryRoleDirectory {
    members: RwLock<AHashMap<UserId, Vec<RoleId>>>,
}

impl MemoryRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role to a user. Assigning a held role again is a no-op.
    pub fn assign(&self, user_id: UserId, role_id: RoleId) {
        let mut members = self.members.write();
        let roles = members.entry(user_id).or_default();
        if !roles.contains(&role_id) {
            roles.push(role_id);
        }
    }

    pub fn revoke(&self, user_id: UserId, role_id: RoleId) -> bool {
        let mut members = self.members.write();
        match members.get_mut(&user_id) {
            Some(roles) => {
                let before = roles.len();
                roles.retain(|r| *r != role_id);
                roles.len() != before
            }
            None => false,
        }
    }
}

impl RoleMembership for MemoryRoleDirectory {
    fn roles_of(&self, user_id: UserId) -> SourceResult<Vec<RoleId>> {
        Ok(self.members.read().get(&user_id).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Paths
// ============================================================================

/// A pre-computed `[object, parent, …, root]` chain.
///
/// Any object on the chain resolves to its suffix; objects off the chain
/// resolve to themselves alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAncestorPath {
    path: Vec<ObjectId>,
}

impl StaticAncestorPath {
    pub fn new(path: Vec<ObjectId>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &[ObjectId] {
        &self.path
    }
}

impl AncestorPath for StaticAncestorPath {
    fn ancestor_path(&self, object_id: ObjectId) -> Result<Vec<ObjectId>> {
        Ok(match self.path.iter().position(|id| *id == object_id) {
            Some(start) => self.path[start..].to_vec(),
            None => vec![object_id],
        })
    }
}
