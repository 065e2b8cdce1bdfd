//! Merkle proof generation types and verification

use serde::{Deserialize, Serialize};

use crate::{hasher::Sha256Hasher, Hash};

/// Side on which a proof sibling sits relative to the running hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Sibling is the left child.
    Left,
    /// Sibling is the right child.
    Right,
}

/// One sibling on the path from a leaf to the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Where the sibling sits
    pub position: Position,
    /// Sibling digest
    pub hash: Hash,
}

impl ProofStep {
    /// Sibling on the left
    pub const fn left(hash: Hash) -> Self {
        Self { position: Position::Left, hash }
    }

    /// Sibling on the right
    pub const fn right(hash: Hash) -> Self {
        Self { position: Position::Right, hash }
    }
}

/// Merkle inclusion proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Index of the proven leaf
    pub leaf_index: usize,
    /// Sibling steps from leaf level upwards. Levels where the node was
    /// promoted without a sibling contribute no step.
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Verify this proof for `leaf` against `root`
    pub fn verify(&self, leaf: &Hash, root: &Hash) -> bool {
        verify(leaf, &self.steps, root)
    }

    /// Root implied by this proof for `leaf`
    pub fn compute_root(&self, leaf: &Hash) -> Hash {
        compute_root(leaf, &self.steps)
    }
}

/// Fold the proof steps over `leaf`.
pub fn compute_root(leaf: &Hash, steps: &[ProofStep]) -> Hash {
    steps.iter().fold(*leaf, |current, step| match step.position {
        Position::Left => Sha256Hasher::hash_pair(&step.hash, &current),
        Position::Right => Sha256Hasher::hash_pair(&current, &step.hash),
    })
}

/// Check that `steps` lead from `leaf` to `expected_root`.
pub fn verify(leaf: &Hash, steps: &[ProofStep], expected_root: &Hash) -> bool {
    compute_root(leaf, steps) == *expected_root
}
