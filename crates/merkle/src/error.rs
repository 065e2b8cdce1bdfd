//! Merkle errors

use thiserror::Error;

/// Errors raised while building a tree or deriving a proof
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// A tree needs at least one leaf.
    #[error("cannot build a merkle tree without leaves")]
    EmptyTree,

    /// Proof requested for a leaf the tree does not have.
    #[error("leaf index {index} out of range for {leaf_count} leaves")]
    IndexOutOfRange {
        /// Requested leaf index.
        index: usize,
        /// Number of leaves in the tree.
        leaf_count: usize,
    },
}
