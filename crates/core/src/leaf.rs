//! Leaf hashing

use emlog_merkle::Sha256Hasher;

use crate::{error::Result, payload::EnergyLogPayload, types::Hash};

/// `SHA256("LOG::" || canonical_bytes(payload))`
pub fn leaf_hash(payload: &EnergyLogPayload) -> Result<Hash> {
    let bytes = payload.canonical_bytes()?;
    Ok(Sha256Hasher::hash_leaf(&bytes))
}
