//! `acl_core`: object hierarchy and access-control resolution for Nexus.
//!
//! This crate assembles partially loaded object rows into a cycle-safe tree and
//! resolves the effective select/insert/update/delete rights of an acting
//! identity on an object, with inheritance up the tree and short-lived caching.
//! Storage access is external; rows arrive through the traits in [`source`].
//!
//! Modules:
//! - `types`      id aliases and the acting [`Identity`]
//! - `error`      [`AclError`] and the crate `Result`
//! - `config`     [`AclConfig`] (TTL, depth guard) parsed from JSON
//! - `context`    task-scoped ambient identity ([`AmbientSecurityContext`])
//! - `tree`       [`TreeCollection`] arena with orphan reconciliation
//! - `permission` flags, grants, results, per-user cache and the resolver
//! - `source`     collaborator traits plus in-memory implementations

pub mod config;
pub mod context;
pub mod error;
pub mod permission;
pub mod source;
pub mod tree;
pub mod types;

pub use config::AclConfig;
pub use context::{AmbientSecurityContext, ContextScope};
pub use error::{AclError, Result, SourceError};
pub use permission::{
    EffectivePermissionResult, GrantFlags, GrantRecord, GrantSubject, PermissionCache,
    PermissionFlags, PermissionResolver, PermissionType, UserPermissionSet,
};
pub use tree::{IntegrityIssue, TreeCollection, TreeNode, TreeStats, TypedTreeCollection};
pub use types::{Identity, ObjectId, RoleId, SchemeId, UserId};
