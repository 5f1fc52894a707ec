//! Effective-permission resolution with inheritance and caching.
//!
//! Object rights are inherited: the resolver walks `[object, parent, …, root]`
//! and the first level with a non-empty match wins. At each level a direct
//! user grant beats role grants. Scheme and global rights are aggregated the
//! same way (user first, then roles) and cached beside the object entries;
//! [`UserPermissionSet::permissions_for_object`] then picks object, scheme or
//! global by override.

use std::sync::Arc;

use tracing::debug;

use super::{
    EffectivePermissionResult, GrantRecord, PermissionCache, PermissionFlags, PermissionType,
    UserPermissionSet,
};
use crate::config::AclConfig;
use crate::context::AmbientSecurityContext;
use crate::error::{AclError, Result};
use crate::source::{AncestorPath, GrantSource, RoleMembership};
use crate::types::{Identity, ObjectId, RoleId, SchemeId, UserId, GLOBAL_TARGET};

/// Winning grants at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GrantMatch {
    permission_type: PermissionType,
    role_id: Option<RoleId>,
    flags: PermissionFlags,
}

/// Union of the user's own rows if any grant something; otherwise the union
/// of rows for the user's roles, tagged with the first role (membership
/// order) that contributed.
fn match_grants(grants: &[GrantRecord], user_id: UserId, roles: &[RoleId]) -> Option<GrantMatch> {
    let user_flags = grants
        .iter()
        .filter(|g| g.is_for_user(user_id))
        .fold(PermissionFlags::NONE, |acc, g| acc | g.effective());
    if !user_flags.is_empty() {
        return Some(GrantMatch {
            permission_type: PermissionType::User,
            role_id: None,
            flags: user_flags,
        });
    }

    let mut role_id = None;
    let mut role_flags = PermissionFlags::NONE;
    for &role in roles {
        let flags = grants
            .iter()
            .filter(|g| g.is_for_role(role))
            .fold(PermissionFlags::NONE, |acc, g| acc | g.effective());
        if !flags.is_empty() {
            role_id.get_or_insert(role);
            role_flags |= flags;
        }
    }
    (!role_flags.is_empty()).then_some(GrantMatch {
        permission_type: PermissionType::Role,
        role_id,
        flags: role_flags,
    })
}

fn flags_of(matched: Option<GrantMatch>) -> PermissionFlags {
    matched.map_or(PermissionFlags::NONE, |m| m.flags)
}

/// Resolves rights for an identity against grant, role and path collaborators.
///
/// Collaborators are generic so a resolver can own them, borrow them for one
/// query, or share them behind `Arc`. The cache is always shared.
pub struct PermissionResolver<G, R, A> {
    grants: G,
    roles: R,
    paths: A,
    cache: Arc<PermissionCache>,
    config: AclConfig,
}

impl<G, R, A> PermissionResolver<G, R, A>
where
    G: GrantSource,
    R: RoleMembership,
    A: AncestorPath,
{
    pub fn new(grants: G, roles: R, paths: A, cache: Arc<PermissionCache>) -> Self {
        Self {
            grants,
            roles,
            paths,
            cache,
            config: AclConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AclConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<PermissionCache> {
        &self.cache
    }

    /// Swap the path collaborator, keeping grants, roles and cache.
    pub fn with_paths<B: AncestorPath>(self, paths: B) -> PermissionResolver<G, R, B> {
        PermissionResolver {
            grants: self.grants,
            roles: self.roles,
            paths,
            cache: self.cache,
            config: self.config,
        }
    }

    /// Inherited object rights of `identity`, with where they came from.
    /// The outcome is recorded in the user's cached set.
    pub fn resolve(&self, object_id: ObjectId, identity: Identity) -> Result<EffectivePermissionResult> {
        check_object_id(object_id)?;
        let Some(user_id) = self.user_for(identity) else {
            return Ok(EffectivePermissionResult::new(
                object_id,
                identity.user_id(),
                object_id,
                PermissionType::User,
                None,
                PermissionFlags::ALL,
            ));
        };

        let roles = self.roles.roles_of(user_id).map_err(AclError::from_source)?;
        let result = self.resolve_object(object_id, user_id, &roles)?;
        self.populate(user_id, &roles, Some((object_id, result.flags())), None)?;
        Ok(result)
    }

    /// [`resolve`](Self::resolve) for the ambient identity.
    pub fn resolve_current(&self, object_id: ObjectId) -> Result<EffectivePermissionResult> {
        self.resolve(object_id, AmbientSecurityContext::get_or_create_default())
    }

    /// Rights on `object_id` after object → scheme → global override.
    /// Served from the cache when the user's set already covers both ids.
    pub fn effective_permissions(
        &self,
        object_id: ObjectId,
        scheme_id: SchemeId,
        identity: Identity,
    ) -> Result<PermissionFlags> {
        check_object_id(object_id)?;
        let Some(user_id) = self.user_for(identity) else {
            return Ok(PermissionFlags::ALL);
        };

        let cached = self.cache.get_valid(user_id);
        let cached_object = cached.as_ref().and_then(|s| s.object_permission(object_id));
        let cached_scheme = cached.as_ref().and_then(|s| s.scheme_permission(scheme_id));
        if let (Some(set), Some(_), Some(_)) = (&cached, cached_object, cached_scheme) {
            return Ok(set.permissions_for_object(object_id, scheme_id));
        }

        let roles = self.roles.roles_of(user_id).map_err(AclError::from_source)?;
        let object_flags = match cached_object {
            Some(flags) => flags,
            None => self.resolve_object(object_id, user_id, &roles)?.flags(),
        };
        let scheme_flags = match cached_scheme {
            Some(flags) => flags,
            None => {
                let grants = self
                    .grants
                    .scheme_grants(scheme_id)
                    .map_err(AclError::from_source)?;
                flags_of(match_grants(&grants, user_id, &roles))
            }
        };

        let set = self.populate(
            user_id,
            &roles,
            Some((object_id, object_flags)),
            Some((scheme_id, scheme_flags)),
        )?;
        Ok(set.permissions_for_object(object_id, scheme_id))
    }

    pub fn can_perform(
        &self,
        object_id: ObjectId,
        scheme_id: SchemeId,
        identity: Identity,
        required: PermissionFlags,
    ) -> Result<bool> {
        Ok(self
            .effective_permissions(object_id, scheme_id, identity)?
            .allows(required))
    }

    pub fn invalidate_user(&self, user_id: UserId) -> bool {
        self.cache.invalidate_user(user_id)
    }

    pub fn invalidate_all(&self) -> usize {
        self.cache.invalidate_all()
    }

    /// `None` when the identity bypasses grants.
    fn user_for(&self, identity: Identity) -> Option<UserId> {
        match identity {
            Identity::System if self.config.system_full_access => None,
            other => Some(other.user_id()),
        }
    }

    fn resolve_object(
        &self,
        object_id: ObjectId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> Result<EffectivePermissionResult> {
        let path = self.paths.ancestor_path(object_id)?;
        for level_id in path {
            let grants = self
                .grants
                .object_grants(level_id)
                .map_err(AclError::from_source)?;
            if let Some(m) = match_grants(&grants, user_id, roles) {
                debug!(
                    object_id,
                    user_id,
                    source = level_id,
                    kind = %m.permission_type,
                    flags = %m.flags,
                    "object permissions resolved"
                );
                return Ok(EffectivePermissionResult::new(
                    object_id,
                    user_id,
                    level_id,
                    m.permission_type,
                    m.role_id,
                    m.flags,
                ));
            }
        }
        debug!(object_id, user_id, "no grant on object path");
        Ok(EffectivePermissionResult::none(object_id, user_id))
    }

    /// Record object and scheme rights in the user's set, creating a fresh
    /// set (with global rights) when none is valid. Entries that already hold
    /// the same flags are left alone so the version only moves on change.
    fn populate(
        &self,
        user_id: UserId,
        roles: &[RoleId],
        object: Option<(ObjectId, PermissionFlags)>,
        scheme: Option<(SchemeId, PermissionFlags)>,
    ) -> Result<Arc<UserPermissionSet>> {
        let apply = move |set: &mut UserPermissionSet| {
            if let Some((object_id, flags)) = object {
                if set.object_permission(object_id) != Some(flags) {
                    set.add_object_permission(object_id, flags);
                }
            }
            if let Some((scheme_id, flags)) = scheme {
                if set.scheme_permission(scheme_id) != Some(flags) {
                    set.add_scheme_permission(scheme_id, flags);
                }
            }
        };

        if let Some(set) = self.cache.update_valid(user_id, apply) {
            debug!(user_id, version = set.version(), "permission set updated");
            return Ok(set);
        }

        let grants = self.grants.global_grants().map_err(AclError::from_source)?;
        let global: Vec<GrantRecord> = grants.into_iter().filter(GrantRecord::is_global).collect();
        let mut fresh = self.cache.new_set(user_id);
        fresh.set_global_permissions(flags_of(match_grants(&global, user_id, roles)));
        apply(&mut fresh);
        Ok(self.cache.insert(fresh))
    }
}

fn check_object_id(object_id: ObjectId) -> Result<()> {
    if object_id == GLOBAL_TARGET {
        return Err(AclError::InvalidArgument(format!(
            "object id {GLOBAL_TARGET} is reserved for global grants"
        )));
    }
    Ok(())
}
