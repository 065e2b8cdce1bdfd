//! Process-memory store

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use emlog_merkle::MerkleTree;
use tracing::debug;

use super::{index::LogIndex, LogStore, TreeBuilder};
use crate::{
    batch::EnergyBatch,
    error::Result,
    leaf::leaf_hash,
    log::EnergyLog,
    payload::EnergyLogPayload,
    types::{BatchId, LogId},
};

/// In-memory store guarded by a single lock.
///
/// Nothing is persisted, so unflushed logs are simply lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<LogIndex>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, LogIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LogIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogStore for MemoryStore {
    fn insert_log(&self, payload: EnergyLogPayload) -> Result<LogId> {
        // Hashing is pure; keep it outside the lock
        let leaf = leaf_hash(&payload)?;

        let mut index = self.write();
        let id = index.fresh_log_id();
        index.push_log(EnergyLog::new(id.clone(), payload, leaf));

        debug!(log_id = %id, leaf_hash = %leaf, "log stored");
        Ok(id)
    }

    fn unbatched_logs_in_order(&self) -> Result<Vec<EnergyLog>> {
        Ok(self.read().unbatched_logs())
    }

    fn unbatched_count(&self) -> Result<usize> {
        Ok(self.read().unbatched_count())
    }

    fn create_batch(
        &self,
        log_ids: &[LogId],
        tree: MerkleTree,
        created_at: DateTime<Utc>,
    ) -> Result<EnergyBatch> {
        let mut index = self.write();
        let slots = index.claim_slots(log_ids)?;
        let pending = index.prepare_batch(slots, tree, created_at)?;
        Ok(index.apply_batch(pending))
    }

    fn seal_unbatched(
        &self,
        created_at: DateTime<Utc>,
        build: &mut TreeBuilder<'_>,
    ) -> Result<EnergyBatch> {
        let mut index = self.write();
        let slots = index.unbatched_slots()?;
        let tree = build(&index.leaves(&slots))?;
        let pending = index.prepare_batch(slots, tree, created_at)?;
        Ok(index.apply_batch(pending))
    }

    fn get_log(&self, id: &LogId) -> Result<EnergyLog> {
        self.read().get_log(id)
    }

    fn get_batch(&self, id: &BatchId) -> Result<EnergyBatch> {
        self.read().batch(id).map(|stored| stored.batch.clone())
    }

    fn batch_tree(&self, id: &BatchId) -> Result<Arc<MerkleTree>> {
        self.read().batch(id).map(|stored| Arc::clone(&stored.tree))
    }

    fn list_logs(&self) -> Result<Vec<EnergyLog>> {
        Ok(self.read().logs().to_vec())
    }

    fn list_batches(&self) -> Result<Vec<EnergyBatch>> {
        Ok(self.read().batches())
    }
}
