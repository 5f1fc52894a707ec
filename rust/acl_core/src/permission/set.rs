//! Per-user cached permission state.

use ahash::AHashMap;
use chrono::{DateTime, Duration, Utc};

use super::PermissionFlags;
use crate::types::{ObjectId, SchemeId, UserId};

/// Cached rights of one user: per object, per scheme and global.
///
/// A plain record with no locking of its own. [`PermissionCache`](super::PermissionCache)
/// shares sets as `Arc` snapshots and mutates by replacing them.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPermissionSet {
    user_id: UserId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    object_permissions: AHashMap<ObjectId, PermissionFlags>,
    scheme_permissions: AHashMap<SchemeId, PermissionFlags>,
    global_permissions: PermissionFlags,
    version: u64,
}

impl UserPermissionSet {
    pub fn new(user_id: UserId, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id,
            created_at,
            expires_at: created_at.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            object_permissions: AHashMap::new(),
            scheme_permissions: AHashMap::new(),
            global_permissions: PermissionFlags::NONE,
            version: 0,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn global_permissions(&self) -> PermissionFlags {
        self.global_permissions
    }

    pub fn object_permission(&self, object_id: ObjectId) -> Option<PermissionFlags> {
        self.object_permissions.get(&object_id).copied()
    }

    pub fn scheme_permission(&self, scheme_id: SchemeId) -> Option<PermissionFlags> {
        self.scheme_permissions.get(&scheme_id).copied()
    }

    pub fn has_object(&self, object_id: ObjectId) -> bool {
        self.object_permissions.contains_key(&object_id)
    }

    pub fn has_scheme(&self, scheme_id: SchemeId) -> bool {
        self.scheme_permissions.contains_key(&scheme_id)
    }

    pub fn object_count(&self) -> usize {
        self.object_permissions.len()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expire immediately. Entries stay readable for diagnostics.
    pub fn invalidate(&mut self) {
        self.expires_at = DateTime::<Utc>::MIN_UTC;
        self.version += 1;
    }

    /// Push `expires_at` forward by `by`. Does not bump the version.
    pub fn extend_expiration(&mut self, by: Duration) {
        self.expires_at = self
            .expires_at
            .checked_add_signed(by)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub fn add_object_permission(&mut self, object_id: ObjectId, flags: PermissionFlags) {
        self.object_permissions.insert(object_id, flags);
        self.version += 1;
    }

    pub fn add_scheme_permission(&mut self, scheme_id: SchemeId, flags: PermissionFlags) {
        self.scheme_permissions.insert(scheme_id, flags);
        self.version += 1;
    }

    pub fn set_global_permissions(&mut self, flags: PermissionFlags) {
        self.global_permissions = flags;
        self.version += 1;
    }

    /// Effective rights by override: a non-empty object entry wins, then a
    /// non-empty scheme entry, then the global value. Levels are never merged.
    pub fn permissions_for_object(&self, object_id: ObjectId, scheme_id: SchemeId) -> PermissionFlags {
        if let Some(flags) = self.object_permission(object_id).filter(|f| !f.is_empty()) {
            return flags;
        }
        if let Some(flags) = self.scheme_permission(scheme_id).filter(|f| !f.is_empty()) {
            return flags;
        }
        self.global_permissions
    }

    pub fn can_perform_operation(
        &self,
        object_id: ObjectId,
        scheme_id: SchemeId,
        required: PermissionFlags,
    ) -> bool {
        self.permissions_for_object(object_id, scheme_id)
            .allows(required)
    }
}
