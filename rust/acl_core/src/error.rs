//! Error types for tree assembly and permission resolution.

use thiserror::Error;

use crate::types::ObjectId;

/// Error raised by a collaborator (node, grant or role source).
///
/// The core never inspects or retries these; they are handed back to the
/// caller inside [`AclError::Source`].
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum AclError {
    /// A node with this id is already present in the collection.
    #[error("duplicate node id: {0}")]
    DuplicateId(ObjectId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An ancestor or descendant walk revisited a node or exceeded the depth bound.
    #[error("cycle detected while walking from node {id}")]
    CycleDetected { id: ObjectId },

    #[error("node not found: {0}")]
    NodeNotFound(ObjectId),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Collaborator failure, passed through unchanged.
    #[error(transparent)]
    Source(SourceError),
}

impl AclError {
    /// Wrap a collaborator error without reinterpreting it.
    pub fn from_source(err: SourceError) -> Self {
        AclError::Source(err)
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, AclError::CycleDetected { .. })
    }
}

pub type Result<T> = std::result::Result<T, AclError>;
