use serde::Serialize;
use std::fmt;

use super::PermissionFlags;
use crate::types::{ObjectId, RoleId, UserId};

/// Whether the winning grant was issued to the user or to one of their roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    User,
    Role,
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionType::User => f.write_str("user"),
            PermissionType::Role => f.write_str("role"),
        }
    }
}

/// Resolved rights of one user on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermissionResult {
    object_id: ObjectId,
    user_id: UserId,
    permission_source_id: ObjectId,
    permission_type: PermissionType,
    role_id: Option<RoleId>,
    can_select: bool,
    can_insert: bool,
    can_update: bool,
    can_delete: bool,
}

impl EffectivePermissionResult {
    pub fn new(
        object_id: ObjectId,
        user_id: UserId,
        permission_source_id: ObjectId,
        permission_type: PermissionType,
        role_id: Option<RoleId>,
        flags: PermissionFlags,
    ) -> Self {
        Self {
            object_id,
            user_id,
            permission_source_id,
            permission_type,
            role_id,
            can_select: flags.can_select(),
            can_insert: flags.can_insert(),
            can_update: flags.can_update(),
            can_delete: flags.can_delete(),
        }
    }

    /// Nothing matched anywhere on the path.
    pub fn none(object_id: ObjectId, user_id: UserId) -> Self {
        Self::new(
            object_id,
            user_id,
            object_id,
            PermissionType::User,
            None,
            PermissionFlags::NONE,
        )
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Object whose grants produced this result.
    pub fn permission_source_id(&self) -> ObjectId {
        self.permission_source_id
    }

    pub fn permission_type(&self) -> PermissionType {
        self.permission_type
    }

    /// First of the user's roles (membership order) that matched, for role grants.
    pub fn role_id(&self) -> Option<RoleId> {
        self.role_id
    }

    pub fn can_select(&self) -> bool {
        self.can_select
    }

    pub fn can_insert(&self) -> bool {
        self.can_insert
    }

    pub fn can_update(&self) -> bool {
        self.can_update
    }

    pub fn can_delete(&self) -> bool {
        self.can_delete
    }

    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags::from_bools(
            self.can_select,
            self.can_insert,
            self.can_update,
            self.can_delete,
        )
    }

    pub fn is_inherited(&self) -> bool {
        self.permission_source_id != self.object_id
    }

    pub fn has_any_permission(&self) -> bool {
        self.can_select || self.can_insert || self.can_update || self.can_delete
    }

    pub fn has_full_permission(&self) -> bool {
        self.can_select && self.can_insert && self.can_update && self.can_delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_when_source_differs() {
        let own = EffectivePermissionResult::new(5, 1, 5, PermissionType::User, None, PermissionFlags::ALL);
        assert!(!own.is_inherited());
        assert!(own.has_full_permission());

        let inherited = EffectivePermissionResult::new(
            5,
            1,
            2,
            PermissionType::Role,
            Some(8),
            PermissionFlags::READ_ONLY,
        );
        assert!(inherited.is_inherited());
        assert!(inherited.has_any_permission());
        assert!(!inherited.has_full_permission());
        assert_eq!(inherited.flags(), PermissionFlags::SELECT);
        assert_eq!(inherited.role_id(), Some(8));
    }

    #[test]
    fn none_result() {
        let result = EffectivePermissionResult::none(3, 4);
        assert!(!result.has_any_permission());
        assert!(!result.is_inherited());
        assert_eq!(result.flags(), PermissionFlags::NONE);
    }

    #[test]
    fn serializes_for_diagnostics() {
        let result = EffectivePermissionResult::new(
            5,
            1,
            2,
            PermissionType::Role,
            Some(8),
            PermissionFlags::SELECT,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["permission_type"], "role");
        assert_eq!(json["permission_source_id"], 2);
        assert_eq!(json["can_select"], true);
        assert_eq!(json["can_delete"], false);
    }
}
