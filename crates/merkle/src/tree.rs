//! Merkle tree construction

use crate::{
    hasher::Sha256Hasher,
    proof::{MerkleProof, ProofStep},
    Hash, MerkleError,
};

/// Binary Merkle tree with every level retained.
///
/// `levels[0]` holds the leaves in their given order, the last level holds the
/// single root. An unpaired trailing node is carried up unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a tree over `leaves` in order.
    pub fn build(leaves: Vec<Hash>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next: Vec<Hash> = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => Sha256Hasher::hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Root digest
    pub fn root(&self) -> Hash {
        // `build` guarantees a non-empty top level
        self.levels.last().and_then(|top| top.first()).copied().unwrap_or(Hash::ZERO)
    }

    /// All levels, leaves first
    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }

    /// Leaf digests in order
    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Height of the tree; zero for a single leaf
    pub fn height(&self) -> usize {
        self.levels.len() - 1
    }

    /// Derive the inclusion proof for the leaf at `index`.
    pub fn prove(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(MerkleError::IndexOutOfRange { index, leaf_count });
        }

        let mut steps = Vec::with_capacity(self.height());
        let mut current = index;

        // The top level is the root and has no sibling
        for level in &self.levels[..self.height()] {
            let step = if current % 2 == 0 {
                level.get(current + 1).copied().map(ProofStep::right)
            } else {
                Some(ProofStep::left(level[current - 1]))
            };
            steps.extend(step);
            current /= 2;
        }

        Ok(MerkleProof { leaf_index: index, steps })
    }
}
