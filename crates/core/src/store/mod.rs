//! Log and batch storage
//!
//! A store exclusively owns both collections. Every mutation it exposes is
//! atomic with respect to every other call on the same store.
//!
//! [`MemoryStore`] keeps everything in process memory. With the `rocksdb`
//! feature, `RocksStore` writes each mutation to disk before it becomes
//! visible and reloads the full state on open.

mod index;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use emlog_merkle::MerkleTree;

pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;

use crate::{
    batch::EnergyBatch,
    error::Result,
    log::EnergyLog,
    payload::EnergyLogPayload,
    types::{BatchId, Hash, LogId},
};

/// Builds a batch tree from leaf hashes in stable order.
pub type TreeBuilder<'a> = dyn FnMut(&[Hash]) -> Result<MerkleTree> + 'a;

/// Storage for logs and batches.
pub trait LogStore: Send + Sync {
    /// Hash and store a payload under a fresh id, unbatched.
    fn insert_log(&self, payload: EnergyLogPayload) -> Result<LogId>;

    /// Unbatched logs in insertion order.
    fn unbatched_logs_in_order(&self) -> Result<Vec<EnergyLog>>;

    /// Number of unbatched logs.
    fn unbatched_count(&self) -> Result<usize>;

    /// Store a batch over `log_ids` (in leaf order) with its tree and mark the
    /// logs batched, all or nothing.
    ///
    /// Fails with `EmptyBatch` for an empty list, `LogNotFound` for unknown
    /// ids, `BatchConflict` for ids listed twice or already batched, and
    /// `Integrity` if the tree's leaves are not the logs' leaf hashes.
    fn create_batch(
        &self,
        log_ids: &[LogId],
        tree: MerkleTree,
        created_at: DateTime<Utc>,
    ) -> Result<EnergyBatch>;

    /// Snapshot the unbatched logs, build their tree and store the batch as one
    /// step. No concurrent call can claim the same logs or slip a log in
    /// between the snapshot and the marking.
    fn seal_unbatched(
        &self,
        created_at: DateTime<Utc>,
        build: &mut TreeBuilder<'_>,
    ) -> Result<EnergyBatch>;

    /// Lookup a log.
    fn get_log(&self, id: &LogId) -> Result<EnergyLog>;

    /// Lookup a batch.
    fn get_batch(&self, id: &BatchId) -> Result<EnergyBatch>;

    /// Tree retained for a batch.
    fn batch_tree(&self, id: &BatchId) -> Result<Arc<MerkleTree>>;

    /// All logs in insertion order.
    fn list_logs(&self) -> Result<Vec<EnergyLog>>;

    /// All batches in creation order.
    fn list_batches(&self) -> Result<Vec<EnergyBatch>>;
}

impl<S: LogStore + ?Sized> LogStore for Box<S> {
    fn insert_log(&self, payload: EnergyLogPayload) -> Result<LogId> {
        (**self).insert_log(payload)
    }

    fn unbatched_logs_in_order(&self) -> Result<Vec<EnergyLog>> {
        (**self).unbatched_logs_in_order()
    }

    fn unbatched_count(&self) -> Result<usize> {
        (**self).unbatched_count()
    }

    fn create_batch(
        &self,
        log_ids: &[LogId],
        tree: MerkleTree,
        created_at: DateTime<Utc>,
    ) -> Result<EnergyBatch> {
        (**self).create_batch(log_ids, tree, created_at)
    }

    fn seal_unbatched(
        &self,
        created_at: DateTime<Utc>,
        build: &mut TreeBuilder<'_>,
    ) -> Result<EnergyBatch> {
        (**self).seal_unbatched(created_at, build)
    }

    fn get_log(&self, id: &LogId) -> Result<EnergyLog> {
        (**self).get_log(id)
    }

    fn get_batch(&self, id: &BatchId) -> Result<EnergyBatch> {
        (**self).get_batch(id)
    }

    fn batch_tree(&self, id: &BatchId) -> Result<Arc<MerkleTree>> {
        (**self).batch_tree(id)
    }

    fn list_logs(&self) -> Result<Vec<EnergyLog>> {
        (**self).list_logs()
    }

    fn list_batches(&self) -> Result<Vec<EnergyBatch>> {
        (**self).list_batches()
    }
}
