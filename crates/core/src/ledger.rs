//! Ledger facade: the operations callers use

use chrono::{DateTime, Utc};
use emlog_merkle::{verify, ProofStep};
use serde::{Deserialize, Serialize};

use crate::{
    batch::EnergyBatch,
    builder::BatchBuilder,
    error::{CoreError, Result},
    log::EnergyLog,
    payload::EnergyLogPayload,
    store::{LogStore, MemoryStore},
    types::{BatchId, Hash, LogId},
};

/// Inclusion proof for one log, self-contained for offline verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogProof {
    /// Proven log
    pub log_id: LogId,
    /// Batch holding the log
    pub batch_id: BatchId,
    /// Leaf position in the batch
    pub index: usize,
    /// Leaf hash of the log
    pub leaf_hash: Hash,
    /// Batch root
    pub merkle_root: Hash,
    /// Sibling path, leaf level first
    pub proof: Vec<ProofStep>,
}

impl LogProof {
    /// Check the path from `leaf_hash` to `merkle_root`
    pub fn verify(&self) -> bool {
        verify(&self.leaf_hash, &self.proof, &self.merkle_root)
    }
}

/// Log ingestion, batching and proofs over one store.
///
/// Create one per process and share it by reference; it is `Sync` whenever the
/// store is.
#[derive(Debug, Default)]
pub struct Ledger<S = MemoryStore> {
    store: S,
}

impl Ledger<MemoryStore> {
    /// Ledger over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: LogStore> Ledger<S> {
    /// Ledger over `store`
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Hash and store a payload. The payload is assumed validated.
    pub fn insert_log(&self, payload: EnergyLogPayload) -> Result<LogId> {
        self.store.insert_log(payload)
    }

    /// Batch every unbatched log.
    pub fn flush(&self) -> Result<EnergyBatch> {
        BatchBuilder::new(&self.store).flush()
    }

    /// Batch every unbatched log, stamping `created_at`.
    pub fn flush_at(&self, created_at: DateTime<Utc>) -> Result<EnergyBatch> {
        BatchBuilder::new(&self.store).flush_at(created_at)
    }

    /// Lookup a log
    pub fn get_log(&self, id: &LogId) -> Result<EnergyLog> {
        self.store.get_log(id)
    }

    /// Lookup a batch
    pub fn get_batch(&self, id: &BatchId) -> Result<EnergyBatch> {
        self.store.get_batch(id)
    }

    /// All logs, insertion order
    pub fn list_logs(&self) -> Result<Vec<EnergyLog>> {
        self.store.list_logs()
    }

    /// All batches, creation order
    pub fn list_batches(&self) -> Result<Vec<EnergyBatch>> {
        self.store.list_batches()
    }

    /// Logs still waiting for a batch
    pub fn unbatched_count(&self) -> Result<usize> {
        self.store.unbatched_count()
    }

    /// Inclusion proof for a batched log.
    pub fn get_proof(&self, log_id: &LogId) -> Result<LogProof> {
        let log = self.store.get_log(log_id)?;
        let batch_id = log.batch_id().cloned().ok_or_else(|| CoreError::NotBatched(log_id.clone()))?;
        let batch = self.store.get_batch(&batch_id)?;
        let index = batch.index_of(log_id).ok_or_else(|| {
            CoreError::Integrity(format!("log {log_id} points at batch {batch_id} which does not list it"))
        })?;

        let tree = self.store.batch_tree(&batch_id)?;
        if tree.leaves().get(index) != Some(&log.leaf_hash()) {
            return Err(CoreError::Integrity(format!(
                "leaf {index} of batch {batch_id} is not the leaf hash of log {log_id}"
            )));
        }
        let proof = tree.prove(index)?;

        Ok(LogProof {
            log_id: log_id.clone(),
            batch_id,
            index,
            leaf_hash: log.leaf_hash(),
            merkle_root: batch.merkle_root(),
            proof: proof.steps,
        })
    }

    /// Recompute the root from `leaf_hash` and `steps` and compare.
    pub fn verify_proof(&self, leaf_hash: &Hash, steps: &[ProofStep], expected_root: &Hash) -> bool {
        verify(leaf_hash, steps, expected_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::tests::sample_payload;
    use emlog_merkle::{Position, Sha256Hasher};

    #[test]
    fn test_proof_not_batched() {
        let ledger = Ledger::in_memory();
        let id = ledger.insert_log(sample_payload("m", 1.0)).unwrap();
        assert_eq!(ledger.get_proof(&id), Err(CoreError::NotBatched(id)));
    }

    #[test]
    fn test_proof_unknown_log() {
        let ledger = Ledger::in_memory();
        let id = LogId::from("log_000000000000");
        assert_eq!(ledger.get_proof(&id), Err(CoreError::LogNotFound(id)));
    }

    #[test]
    fn test_three_log_scenario() {
        let ledger = Ledger::in_memory();
        let ids: Vec<_> =
            ["a", "b", "c"].iter().map(|m| ledger.insert_log(sample_payload(m, 1.0)).unwrap()).collect();
        let leaves: Vec<_> = ids.iter().map(|id| ledger.get_log(id).unwrap().leaf_hash()).collect();

        let batch = ledger.flush().unwrap();
        let p1 = Sha256Hasher::hash_pair(&leaves[0], &leaves[1]);
        assert_eq!(batch.merkle_root(), Sha256Hasher::hash_pair(&p1, &leaves[2]));

        let proof = ledger.get_proof(&ids[2]).unwrap();
        assert_eq!(proof.index, 2);
        assert_eq!(proof.leaf_hash, leaves[2]);
        assert_eq!(proof.proof, vec![ProofStep { position: Position::Left, hash: p1 }]);
        assert!(proof.verify());
        assert!(ledger.verify_proof(&leaves[2], &proof.proof, &batch.merkle_root()));
        assert!(!ledger.verify_proof(&leaves[1], &proof.proof, &batch.merkle_root()));
    }

    #[test]
    fn test_single_log_scenario() {
        let ledger = Ledger::in_memory();
        let id = ledger.insert_log(sample_payload("solo", 2.0)).unwrap();
        let leaf = ledger.get_log(&id).unwrap().leaf_hash();

        let batch = ledger.flush().unwrap();
        assert_eq!(batch.log_count(), 1);
        assert_eq!(batch.merkle_root(), leaf);

        let proof = ledger.get_proof(&id).unwrap();
        assert!(proof.proof.is_empty());
        assert!(proof.verify());
    }

    #[test]
    fn test_proof_json_shape() {
        let ledger = Ledger::in_memory();
        let first = ledger.insert_log(sample_payload("a", 1.0)).unwrap();
        ledger.insert_log(sample_payload("b", 1.0)).unwrap();
        ledger.flush().unwrap();

        let json = serde_json::to_value(ledger.get_proof(&first).unwrap()).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["proof"][0]["position"], "right");
        assert!(json["leaf_hash"].as_str().unwrap().len() == 64);

        let back: LogProof = serde_json::from_value(json).unwrap();
        assert!(back.verify());
    }
}
