//! Error types for the ledger core

use emlog_merkle::MerkleError;
use thiserror::Error;

use crate::types::{BatchId, LogId};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the ledger core.
///
/// Every error is terminal for the operation that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed or incomplete payload, raised by the ingestion surface.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Flush attempted with zero unbatched logs.
    #[error("no unbatched logs available")]
    EmptyBatch,

    /// Proof requested for an index outside the tree's leaves.
    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange {
        /// Requested leaf index.
        index: usize,
        /// Number of leaves in the tree.
        leaf_count: usize,
    },

    /// Unknown log id.
    #[error("log not found: {0}")]
    LogNotFound(LogId),

    /// Unknown batch id.
    #[error("batch not found: {0}")]
    BatchNotFound(BatchId),

    /// Proof requested for a log that is not in a batch yet.
    #[error("log {0} is not batched yet")]
    NotBatched(LogId),

    /// Batch creation would put a log into a second batch, or list it twice.
    #[error("batch conflict: {0}")]
    BatchConflict(String),

    /// Stored data disagrees with itself, e.g. a tree whose leaves do not match
    /// the logs it claims to cover.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Payload cannot be turned into canonical bytes.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// The durable backend failed to read or write.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// True for both unknown-log and unknown-batch lookups.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::LogNotFound(_) | Self::BatchNotFound(_))
    }

    /// Storage error from any displayable backend failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<MerkleError> for CoreError {
    fn from(err: MerkleError) -> Self {
        match err {
            MerkleError::EmptyTree => Self::EmptyBatch,
            MerkleError::IndexOutOfRange { index, leaf_count } => {
                Self::IndexOutOfRange { index, leaf_count }
            }
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Canonicalization(err.to_string())
    }
}
