//! Storage error types

use core_types::{DecodeError, PropertyType};
use hal::MediumError;
use thiserror::Error;

/// Errors from block stores and storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// The underlying medium or partition failed
    #[error("Medium error: {0}")]
    Medium(MediumError),

    /// A block is already open on this backend
    #[error("Transaction conflict: block {0} is still open")]
    TransactionConflict(String),

    /// Read/write/end issued without an open block
    #[error("No open block transaction")]
    NoTransaction,

    /// Block id 0 marks the end of the chain and cannot be allocated
    #[error("Block id 0 is reserved for the EOF marker")]
    ReservedId,

    /// No block stored under this tag or id
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// Sequential read ran past the block's data region
    #[error("Read past end of block: need {needed} bytes, {remaining} remaining")]
    ReadPastEnd { needed: usize, remaining: usize },

    /// Sequential write ran past the block's data region
    #[error("Write past end of block: need {needed} bytes, {remaining} remaining")]
    WritePastEnd { needed: usize, remaining: usize },

    /// Allocation does not fit on the medium
    #[error("No space left on medium: need {needed} bytes, {available} available")]
    NoSpace { needed: usize, available: usize },

    /// Header chain does not describe a valid layout
    #[error("Corrupt block chain at offset {0}")]
    CorruptChain(usize),

    /// Tag rejected before reaching the backend
    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    /// Backend or block was opened read-only
    #[error("Backend is read-only")]
    ReadOnly,

    /// Stored bytes do not decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Stored value has a different type than requested
    #[error("Type mismatch for {tag}: expected {expected}")]
    TypeMismatch { tag: String, expected: PropertyType },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediumError> for StorageError {
    fn from(err: MediumError) -> Self {
        Self::Medium(err)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
