//! Resolver configuration and JSON parsing helpers.

use serde::Deserialize;

use crate::error::{AclError, Result};

/// Default permission-cache TTL (30 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 60;

/// Default bound on ancestor/descendant walks.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 1024;

/// Tunables for tree traversal and permission resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AclConfig {
    /// Lifetime of a cached per-user permission set.
    pub cache_ttl_secs: u64,
    /// Maximum number of parent hops a walk may take before it is treated as a cycle.
    pub max_tree_depth: usize,
    /// Whether the system identity bypasses grant lookups with full rights.
    pub system_full_access: bool,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            system_full_access: true,
        }
    }
}

impl AclConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(AclError::InvalidArgument(
                "cache_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_tree_depth == 0 {
            return Err(AclError::InvalidArgument(
                "max_tree_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        // chrono::Duration::seconds panics above i64::MAX / 1000
        let secs = self.cache_ttl_secs.min((i64::MAX / 1000) as u64) as i64;
        chrono::Duration::seconds(secs)
    }
}

/// Parse and validate a config from a JSON string.
pub fn parse_config(json: &str) -> Result<AclConfig> {
    let config: AclConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_object_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config, AclConfig::default());
        assert_eq!(config.cache_ttl(), chrono::Duration::minutes(30));
    }

    #[test]
    fn parse_overrides() {
        let json = r#"{"cache_ttl_secs":60,"max_tree_depth":8,"system_full_access":false}"#;
        let config = parse_config(json).unwrap();
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.max_tree_depth, 8);
        assert!(!config.system_full_access);
    }

    #[test]
    fn zero_ttl_rejected() {
        let err = parse_config(r#"{"cache_ttl_secs":0}"#).unwrap_err();
        assert!(matches!(err, AclError::InvalidArgument(_)));
    }

    #[test]
    fn zero_depth_rejected() {
        let err = parse_config(r#"{"max_tree_depth":0}"#).unwrap_err();
        assert!(matches!(err, AclError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_field_is_config_error() {
        let err = parse_config(r#"{"ttl":5}"#).unwrap_err();
        assert!(matches!(err, AclError::Config(_)));
    }
}
