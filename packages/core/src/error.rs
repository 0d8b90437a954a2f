//! Tree Error Types
//!
//! Errors raised by the Node Store and the editing services. None of these are
//! fatal: the editor session turns invalid targets and stale references into
//! logged no-ops, and naming conflicts never surface here at all because they
//! are negotiated through the conflict resolution prompt.

use thiserror::Error;

/// Errors raised by tree operations
#[derive(Error, Debug)]
pub enum TreeError {
    /// Node not found by ID (deleted, purged, or never existed)
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Parent reference is unknown or not attached to the tree
    #[error("Invalid parent node: {parent_id}")]
    InvalidParent { parent_id: String },

    /// A move would place a node under itself or one of its descendants
    #[error("Circular reference detected: {context}")]
    CircularReference { context: String },

    /// Operation target is not acceptable (e.g. pasting into a leaf)
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Document record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl TreeError {
    /// Create a node not found error
    pub fn node_not_found(id: impl ToString) -> Self {
        Self::NodeNotFound { id: id.to_string() }
    }

    /// Create an invalid parent error
    pub fn invalid_parent(parent_id: impl ToString) -> Self {
        Self::InvalidParent {
            parent_id: parent_id.to_string(),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(context: impl Into<String>) -> Self {
        Self::CircularReference {
            context: context.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    /// Create a serialization error
    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
