//! Raw grant rows as supplied by a [`GrantSource`](crate::source::GrantSource).

use serde::{Deserialize, Serialize};

use super::PermissionFlags;
use crate::types::{RoleId, UserId, GLOBAL_TARGET};

/// Who a grant is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GrantSubject {
    User(UserId),
    Role(RoleId),
}

/// Stored rights of a grant row. A right may be unset (`None`) or explicitly
/// denied (`Some(false)`); both mean "not granted" once collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantFlags {
    pub can_select: Option<bool>,
    pub can_insert: Option<bool>,
    pub can_update: Option<bool>,
    pub can_delete: Option<bool>,
}

impl GrantFlags {
    /// Explicit row for `flags`: held rights `true`, the rest `false`.
    pub fn from_flags(flags: PermissionFlags) -> Self {
        Self {
            can_select: Some(flags.can_select()),
            can_insert: Some(flags.can_insert()),
            can_update: Some(flags.can_update()),
            can_delete: Some(flags.can_delete()),
        }
    }

    pub fn effective(&self) -> PermissionFlags {
        PermissionFlags::from_bools(
            self.can_select == Some(true),
            self.can_insert == Some(true),
            self.can_update == Some(true),
            self.can_delete == Some(true),
        )
    }
}

impl From<PermissionFlags> for GrantFlags {
    fn from(flags: PermissionFlags) -> Self {
        Self::from_flags(flags)
    }
}

/// One grant row. `target_ref` is an object or scheme id depending on which
/// lookup returned it, or [`GLOBAL_TARGET`] for a global grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub subject: GrantSubject,
    pub target_ref: i64,
    #[serde(default)]
    pub flags: GrantFlags,
}

impl GrantRecord {
    pub fn new(subject: GrantSubject, target_ref: i64, flags: impl Into<GrantFlags>) -> Self {
        Self {
            subject,
            target_ref,
            flags: flags.into(),
        }
    }

    pub fn user(user_id: UserId, target_ref: i64, flags: PermissionFlags) -> Self {
        Self::new(GrantSubject::User(user_id), target_ref, flags)
    }

    pub fn role(role_id: RoleId, target_ref: i64, flags: PermissionFlags) -> Self {
        Self::new(GrantSubject::Role(role_id), target_ref, flags)
    }

    pub fn is_global(&self) -> bool {
        self.target_ref == GLOBAL_TARGET
    }

    pub fn effective(&self) -> PermissionFlags {
        self.flags.effective()
    }

    pub fn is_for_user(&self, user_id: UserId) -> bool {
        self.subject == GrantSubject::User(user_id)
    }

    pub fn is_for_role(&self, role_id: RoleId) -> bool {
        self.subject == GrantSubject::Role(role_id)
    }
}
