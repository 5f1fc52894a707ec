//! Collaborator traits through which rows enter the core.
//!
//! Storage access lives outside this crate. Node rows, grant rows and role
//! memberships are pulled through these traits, and their failures come back
//! to the caller unchanged as [`AclError::Source`](crate::AclError::Source).

pub mod memory;

use std::sync::Arc;

use crate::error::{Result, SourceError};
use crate::permission::GrantRecord;
use crate::tree::{TreeCollection, TreeNode};
use crate::types::{ObjectId, RoleId, SchemeId, UserId};

pub use memory::{MemoryGrantStore, MemoryNodeSource, MemoryRoleDirectory, StaticAncestorPath};

/// Outcome of a collaborator call.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Supplies the node rows of one hierarchy.
pub trait NodeSource<P> {
    fn load_nodes(&self, root_id: ObjectId) -> SourceResult<Vec<TreeNode<P>>>;
}

/// Supplies raw grant rows for an object, a scheme, or the global scope.
pub trait GrantSource {
    fn object_grants(&self, object_id: ObjectId) -> SourceResult<Vec<GrantRecord>>;

    fn scheme_grants(&self, scheme_id: SchemeId) -> SourceResult<Vec<GrantRecord>>;

    fn global_grants(&self) -> SourceResult<Vec<GrantRecord>>;
}

/// Maps a user to their roles, in membership order.
pub trait RoleMembership {
    fn roles_of(&self, user_id: UserId) -> SourceResult<Vec<RoleId>>;
}

/// Supplies `[object, parent, …, root]` for inheritance walks.
pub trait AncestorPath {
    fn ancestor_path(&self, object_id: ObjectId) -> Result<Vec<ObjectId>>;
}

/// A loaded tree answers path queries directly. Objects it does not hold
/// resolve to a single-element path so their own grants still apply.
impl<P> AncestorPath for TreeCollection<P> {
    fn ancestor_path(&self, object_id: ObjectId) -> Result<Vec<ObjectId>> {
        if !self.contains(object_id) {
            return Ok(vec![object_id]);
        }
        TreeCollection::ancestor_path(self, object_id)
    }
}

// Forwarding impls so resolvers can borrow or share collaborators.

impl<P, T: NodeSource<P> + ?Sized> NodeSource<P> for &T {
    fn load_nodes(&self, root_id: ObjectId) -> SourceResult<Vec<TreeNode<P>>> {
        (**self).load_nodes(root_id)
    }
}

impl<T: GrantSource + ?Sized> GrantSource for &T {
    fn object_grants(&self, object_id: ObjectId) -> SourceResult<Vec<GrantRecord>> {
        (**self).object_grants(object_id)
    }

    fn scheme_grants(&self, scheme_id: SchemeId) -> SourceResult<Vec<GrantRecord>> {
        (**self).scheme_grants(scheme_id)
    }

    fn global_grants(&self) -> SourceResult<Vec<GrantRecord>> {
        (**self).global_grants()
    }
}

impl<T: GrantSource + ?Sized> GrantSource for Arc<T> {
    fn object_grants(&self, object_id: ObjectId) -> SourceResult<Vec<GrantRecord>> {
        (**self).object_grants(object_id)
    }

    fn scheme_grants(&self, scheme_id: SchemeId) -> SourceResult<Vec<GrantRecord>> {
        (**self).scheme_grants(scheme_id)
    }

    fn global_grants(&self) -> SourceResult<Vec<GrantRecord>> {
        (**self).global_grants()
    }
}

impl<T: RoleMembership + ?Sized> RoleMembership for &T {
    fn roles_of(&self, user_id: UserId) -> SourceResult<Vec<RoleId>> {
        (**self).roles_of(user_id)
    }
}

impl<T: RoleMembership + ?Sized> RoleMembership for Arc<T> {
    fn roles_of(&self, user_id: UserId) -> SourceResult<Vec<RoleId>> {
        (**self).roles_of(user_id)
    }
}

impl<T: AncestorPath + ?Sized> AncestorPath for &T {
    fn ancestor_path(&self, object_id: ObjectId) -> Result<Vec<ObjectId>> {
        (**self).ancestor_path(object_id)
    }
}

impl<T: AncestorPath + ?Sized> AncestorPath for Arc<T> {
    fn ancestor_path(&self, object_id: ObjectId) -> Result<Vec<ObjectId>> {
        (**self).ancestor_path(object_id)
    }
}
