//! SHA-256 hasher for leaves and inner nodes

use sha2::{Digest, Sha256};

use crate::Hash;

/// Domain prefix for leaf hashes
pub const LEAF_PREFIX: &[u8] = b"LOG::";

/// Domain prefix for inner node hashes
pub const NODE_PREFIX: &[u8] = b"NODE::";

/// SHA-256 hasher
///
/// Both tree construction and proof verification go through [`Self::hash_pair`].
#[derive(Debug, Clone, Copy)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    /// Hash two child digests into their parent. Order matters.
    pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(NODE_PREFIX);
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Hash::from_bytes(hasher.finalize().into())
    }

    /// Hash canonical leaf bytes
    pub fn hash_leaf(data: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(LEAF_PREFIX);
        hasher.update(data);
        Hash::from_bytes(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256(data: &[u8]) -> Hash {
        Hash::from_bytes(Sha256::digest(data).into())
    }

    #[test]
    fn test_hash_pair_is_ordered() {
        let left = Hash::from_bytes([1u8; 32]);
        let right = Hash::from_bytes([2u8; 32]);
        assert_ne!(
            Sha256Hasher::hash_pair(&left, &right),
            Sha256Hasher::hash_pair(&right, &left)
        );
    }

    #[test]
    fn test_leaf_and_node_domains_differ() {
        let left = Hash::from_bytes([7u8; 32]);
        let right = Hash::from_bytes([9u8; 32]);

        let mut raw = Vec::new();
        raw.extend_from_slice(left.as_bytes());
        raw.extend_from_slice(right.as_bytes());

        assert_ne!(Sha256Hasher::hash_leaf(&raw), Sha256Hasher::hash_pair(&left, &right));
        assert_ne!(sha256(&raw), Sha256Hasher::hash_pair(&left, &right));
    }

    #[test]
    fn test_leaf_prefix_applied() {
        let mut prefixed = LEAF_PREFIX.to_vec();
        prefixed.extend_from_slice(b"{\"a\":1}");
        assert_eq!(Sha256Hasher::hash_leaf(b"{\"a\":1}"), sha256(&prefixed));
    }

    #[test]
    fn test_node_prefix_applied() {
        let (left, right) = (Hash::from_bytes([3u8; 32]), Hash::from_bytes([4u8; 32]));
        let mut prefixed = NODE_PREFIX.to_vec();
        prefixed.extend_from_slice(left.as_bytes());
        prefixed.extend_from_slice(right.as_bytes());
        assert_eq!(Sha256Hasher::hash_pair(&left, &right), sha256(&prefixed));
    }
}
