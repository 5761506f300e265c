//! Error types for the settings service

use core_types::NodeId;
use services_storage::StorageError;
use thiserror::Error;

/// Failure while walking a tree against one backend
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("Node {0} is not part of the tree")]
    UnknownNode(NodeId),

    #[error("Block {0:?} not found")]
    BlockNotFound(String),

    #[error("Identity hash missing in block {0:?}")]
    IdentityMissing(String),

    #[error("Identity hash mismatch in block {tag:?}: stored {stored:#010x}, expected {expected:#010x}")]
    IdentityMismatch {
        tag: String,
        stored: u32,
        expected: u32,
    },

    #[error("Block {tag:?}: {source}")]
    Block {
        tag: String,
        #[source]
        source: StorageError,
    },

    #[error("{failed} of {total} blocks failed")]
    Partial { failed: usize, total: usize },
}

impl CascadeError {
    /// The root block or its identity hash is not there at all
    ///
    /// Distinguishes "nothing saved under this tag" from "something else is
    /// saved here"; only the former warrants a retry under legacy tags.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            CascadeError::BlockNotFound(_) | CascadeError::IdentityMissing(_)
        )
    }
}

/// Settings manager errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("No primary storage configured")]
    NoStorage,

    #[error("Node {0} is not part of the tree")]
    UnknownNode(NodeId),

    #[error("Save to {backend} failed: {source}")]
    Save {
        backend: String,
        #[source]
        source: CascadeError,
    },

    #[error("No usable settings data found")]
    NoUsableData,

    #[error("Reset of {backend} failed: {source}")]
    Reset {
        backend: String,
        #[source]
        source: StorageError,
    },
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity string must not be empty")]
    EmptyIdentity,
}
