//! Domain types shared across acl_core modules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Object id. Unique within a [`TreeCollection`](crate::TreeCollection).
pub type ObjectId = i64;

/// Scheme (object type) id.
pub type SchemeId = i64;

/// User id.
pub type UserId = i64;

/// Role id.
pub type RoleId = i64;

/// Target reference that marks a grant as global.
pub const GLOBAL_TARGET: i64 = 0;

/// User id reported for the [`Identity::System`] sentinel.
pub const SYSTEM_USER_ID: UserId = 0;

/// The identity permission checks are evaluated for.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// A concrete user.
    User(UserId),
    /// System/admin sentinel used when no user has been set.
    System,
}

impl Identity {
    pub fn user(id: UserId) -> Self {
        Identity::User(id)
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Identity::System)
    }

    /// User id of this identity; [`SYSTEM_USER_ID`] for the system sentinel.
    pub fn user_id(&self) -> UserId {
        match self {
            Identity::User(id) => *id,
            Identity::System => SYSTEM_USER_ID,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{id}"),
            Identity::System => f.write_str("system"),
        }
    }
}
