//! Binary Merkle tree over energy-log leaf hashes
//!
//! This crate provides the hashing primitive shared by tree construction and
//! proof verification, plus the tree itself.
//! Key properties:
//! - Domain separation: leaves hash under `LOG::`, inner nodes under `NODE::`
//! - Non-commutative pairing: `parent = H(NODE:: || left || right)`
//! - Odd rule: an unpaired node is promoted to the next level unchanged
//! - Every level is retained so proofs need no recomputation

mod error;
mod hash;
mod hasher;
mod proof;
mod tree;

pub use error::MerkleError;
pub use hash::{Hash, HashParseError};
pub use hasher::{Sha256Hasher, LEAF_PREFIX, NODE_PREFIX};
pub use proof::{compute_root, verify, MerkleProof, Position, ProofStep};
pub use tree::MerkleTree;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_leaf_tree() {
        let leaf = Sha256Hasher::hash_leaf(b"{}");
        let tree = MerkleTree::build(vec![leaf]).unwrap();

        assert_eq!(tree.root(), leaf);
        let proof = tree.prove(0).unwrap();
        assert!(proof.steps.is_empty());
        assert!(proof.verify(&leaf, &tree.root()));
    }

    #[test]
    fn test_build_and_prove() {
        let leaves: Vec<Hash> = (0u8..5).map(|i| Sha256Hasher::hash_leaf(&[i])).collect();
        let tree = MerkleTree::build(leaves.clone()).unwrap();

        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.prove(i).unwrap();
            assert!(verify(leaf, &proof.steps, &tree.root()));
        }
    }
}
