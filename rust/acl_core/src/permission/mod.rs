//! Permission model, per-user cache and resolver.
//!
//! Rights are `select`, `insert`, `update` and `delete`. Grants attach them to
//! a user or a role at an object, a scheme, or globally. Object rights are
//! inherited down the tree; the user's effective rights on an object then
//! come from the first non-empty of object, scheme and global, never a merge.

pub mod cache;
pub mod flags;
pub mod grant;
pub mod resolver;
pub mod result;
pub mod set;


pub use cache::{CacheStats, Clock, ManualClock, PermissionCache, SystemClock};
pub use flags::PermissionFlags;
pub use grant::{GrantFlags, GrantRecord, GrantSubject};
pub use resolver::PermissionResolver;
pub use result::{EffectivePermissionResult, PermissionType};
pub use set::UserPermissionSet;
