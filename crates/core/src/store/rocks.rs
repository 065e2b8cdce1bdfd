//! RocksDB-backed store
//!
//! Logs are keyed by arena slot and batches by creation position, both as
//! big-endian `u64`, so a forward scan replays insertion order. Records are
//! JSON. A batch write rewrites its logs with the new `batch_id` and adds the
//! batch record with its tree levels in one `WriteBatch`.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use emlog_merkle::MerkleTree;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    index::{LogIndex, PendingBatch},
    LogStore, TreeBuilder,
};
use crate::{
    batch::EnergyBatch,
    error::{CoreError, Result},
    leaf::leaf_hash,
    log::EnergyLog,
    payload::EnergyLogPayload,
    types::{BatchId, Hash, LogId},
};

/// Column family names.
mod cf {
    pub(super) const LOGS: &str = "logs";
    pub(super) const BATCHES: &str = "batches";
}

#[derive(Serialize, Deserialize)]
struct LogRecord {
    id: LogId,
    payload: EnergyLogPayload,
    leaf_hash: Hash,
    batch_id: Option<BatchId>,
}

impl LogRecord {
    fn of(log: &EnergyLog, batch_id: Option<&BatchId>) -> Self {
        Self {
            id: log.id().clone(),
            payload: log.payload().clone(),
            leaf_hash: log.leaf_hash(),
            batch_id: batch_id.cloned(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BatchRecord {
    batch: EnergyBatch,
    /// Tree levels, leaves first
    levels: Vec<Vec<Hash>>,
}

/// Durable store over a RocksDB directory.
///
/// The full state is loaded and checked on [`RocksStore::open`] and then
/// served from memory. Every mutation is written to disk before it becomes
/// visible; a failed write leaves both disk and memory unchanged.
pub struct RocksStore {
    index: RwLock<LogIndex>,
    db: DB,
    path: PathBuf,
}

impl fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocksStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl RocksStore {
    /// Open or create a store at `path` and load everything in it.
    ///
    /// Fails with `Storage` if the database cannot be opened or read and with
    /// `Integrity` if the stored logs and batches disagree with each other.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening RocksDB at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = [cf::LOGS, cf::BATCHES]
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors).map_err(CoreError::storage)?;

        let store = Self { index: RwLock::new(LogIndex::default()), db, path: path.to_path_buf() };
        let index = store.load()?;
        info!(
            logs = index.logs().len(),
            unbatched = index.unbatched_count(),
            batches = index.batch_count(),
            "store loaded"
        );
        *store.write() = index;
        Ok(store)
    }

    /// Directory the store lives in
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, LogIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LogIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| CoreError::storage(format!("missing column family: {name}")))
    }

    /// Decode one column family in key order, checking keys run 0, 1, 2, ...
    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        self.db
            .iterator_cf(&cf, IteratorMode::Start)
            .enumerate()
            .map(|(expected, item)| {
                let (key, value) = item.map_err(CoreError::storage)?;
                let position = decode_key(&key)?;
                if position != expected {
                    return Err(CoreError::Integrity(format!(
                        "{name} record {expected} missing, found {position}"
                    )));
                }
                serde_json::from_slice(&value).map_err(CoreError::storage)
            })
            .collect()
    }

    fn load(&self) -> Result<LogIndex> {
        let mut index = LogIndex::default();

        for record in self.scan::<LogRecord>(cf::LOGS)? {
            if leaf_hash(&record.payload)? != record.leaf_hash {
                return Err(CoreError::Integrity(format!(
                    "stored leaf hash of log {} does not match its payload",
                    record.id
                )));
            }
            index.push_log(EnergyLog::from_parts(
                record.id,
                record.payload,
                record.leaf_hash,
                record.batch_id,
            ));
        }

        for record in self.scan::<BatchRecord>(cf::BATCHES)? {
            let invalid_tree = || {
                CoreError::Integrity(format!(
                    "stored tree of batch {} is not a valid Merkle tree",
                    record.batch.id()
                ))
            };
            let leaves = record.levels.first().cloned().unwrap_or_default();
            let tree = MerkleTree::build(leaves).map_err(|_| invalid_tree())?;
            if tree.levels() != record.levels.as_slice() {
                return Err(invalid_tree());
            }
            index.restore_batch(record.batch, tree)?;
        }

        index.check_batch_owners()?;
        Ok(index)
    }

    fn put_log(&self, wb: &mut WriteBatch, slot: usize, record: &LogRecord) -> Result<()> {
        wb.put_cf(self.cf(cf::LOGS)?, encode_key(slot), encode(record)?);
        Ok(())
    }

    fn commit(&self, wb: WriteBatch) -> Result<()> {
        self.db.write(wb).map_err(CoreError::storage)
    }

    /// Write a prepared batch: every log with its new owner plus the batch
    /// record, as one write.
    fn persist_batch(&self, index: &LogIndex, pending: &PendingBatch) -> Result<()> {
        let batch = pending.batch();
        let mut wb = WriteBatch::default();
        for &slot in pending.slots() {
            self.put_log(&mut wb, slot, &LogRecord::of(&index.logs()[slot], Some(batch.id())))?;
        }

        let record = BatchRecord { batch: batch.clone(), levels: pending.tree().levels().to_vec() };
        wb.put_cf(self.cf(cf::BATCHES)?, encode_key(index.batch_count()), encode(&record)?);
        self.commit(wb)?;

        debug!(batch_id = %batch.id(), log_count = batch.log_count(), "batch persisted");
        Ok(())
    }
}

fn encode_key(position: usize) -> [u8; 8] {
    (position as u64).to_be_bytes()
}

fn decode_key(key: &[u8]) -> Result<usize> {
    let bytes: [u8; 8] =
        key.try_into().map_err(|_| CoreError::storage("invalid key encoding"))?;
    usize::try_from(u64::from_be_bytes(bytes)).map_err(CoreError::storage)
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(CoreError::storage)
}

impl LogStore for RocksStore {
    fn insert_log(&self, payload: EnergyLogPayload) -> Result<LogId> {
        let leaf = leaf_hash(&payload)?;

        let mut index = self.write();
        let id = index.fresh_log_id();
        let log = EnergyLog::new(id.clone(), payload, leaf);

        let mut wb = WriteBatch::default();
        self.put_log(&mut wb, index.next_slot(), &LogRecord::of(&log, None))?;
        self.commit(wb)?;
        index.push_log(log);

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
        self.persist_batch(&index, &pending)?;
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
        self.persist_batch(&index, &pending)?;
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
