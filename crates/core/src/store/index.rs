//! In-memory index shared by every store
//!
//! Logs live in an insertion-ordered arena addressed by slot; ids map to
//! slots. Batch creation is split into a pure [`LogIndex::prepare_batch`] and
//! an infallible [`LogIndex::apply_batch`] so a durable store can write the
//! prepared batch to disk in between.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use emlog_merkle::MerkleTree;

use crate::{
    batch::EnergyBatch,
    error::{CoreError, Result},
    log::EnergyLog,
    types::{BatchId, Hash, LogId},
};

#[derive(Debug, Default)]
pub(super) struct LogIndex {
    /// Log arena, insertion order
    logs: Vec<EnergyLog>,
    /// Log id -> arena slot
    log_slots: HashMap<LogId, usize>,
    /// Slots of unbatched logs, ascending = insertion order
    unbatched: BTreeSet<usize>,
    /// Batches, creation order
    batches: Vec<StoredBatch>,
    /// Batch id -> position in `batches`
    batch_slots: HashMap<BatchId, usize>,
}

#[derive(Debug)]
pub(super) struct StoredBatch {
    pub(super) batch: EnergyBatch,
    pub(super) tree: Arc<MerkleTree>,
}

/// A checked batch not yet visible in the index.
#[derive(Debug)]
pub(super) struct PendingBatch {
    slots: Vec<usize>,
    batch: EnergyBatch,
    tree: MerkleTree,
}

impl PendingBatch {
    pub(super) const fn batch(&self) -> &EnergyBatch {
        &self.batch
    }

    pub(super) const fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    pub(super) fn slots(&self) -> &[usize] {
        &self.slots
    }
}

impl LogIndex {
    pub(super) fn fresh_log_id(&self) -> LogId {
        loop {
            let id = LogId::random();
            if !self.log_slots.contains_key(&id) {
                return id;
            }
        }
    }

    /// Append a log at [`Self::next_slot`]. Logs without a batch join the
    /// unbatched set.
    pub(super) fn push_log(&mut self, log: EnergyLog) {
        let slot = self.logs.len();
        if !log.is_batched() {
            self.unbatched.insert(slot);
        }
        self.log_slots.insert(log.id().clone(), slot);
        self.logs.push(log);
    }

    pub(super) fn next_slot(&self) -> usize {
        self.logs.len()
    }

    fn next_batch_id(&self, created_at: &DateTime<Utc>) -> BatchId {
        let mut seq = self.batches.len() + 1;
        loop {
            let id = BatchId::new(format!(
                "batch_{}_{seq:04}",
                created_at.format("%Y-%m-%dT%H-%M-%S")
            ));
            if !self.batch_slots.contains_key(&id) {
                return id;
            }
            seq += 1;
        }
    }

    /// Resolve ids to slots, checking every id before anything is touched.
    pub(super) fn claim_slots(&self, log_ids: &[LogId]) -> Result<Vec<usize>> {
        if log_ids.is_empty() {
            return Err(CoreError::EmptyBatch);
        }

        let mut seen = HashSet::with_capacity(log_ids.len());
        log_ids
            .iter()
            .map(|id| {
                let slot =
                    *self.log_slots.get(id).ok_or_else(|| CoreError::LogNotFound(id.clone()))?;
                if !seen.insert(slot) {
                    return Err(CoreError::BatchConflict(format!("log {id} listed twice")));
                }
                if let Some(owner) = self.logs[slot].batch_id() {
                    return Err(CoreError::BatchConflict(format!(
                        "log {id} already belongs to batch {owner}"
                    )));
                }
                Ok(slot)
            })
            .collect()
    }

    /// Every unbatched slot in insertion order.
    pub(super) fn unbatched_slots(&self) -> Result<Vec<usize>> {
        if self.unbatched.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        Ok(self.unbatched.iter().copied().collect())
    }

    pub(super) fn leaves(&self, slots: &[usize]) -> Vec<Hash> {
        slots.iter().map(|&slot| self.logs[slot].leaf_hash()).collect()
    }

    /// Check `tree` against the logs at `slots` and build the batch record.
    /// `slots` must come from [`Self::claim_slots`] or
    /// [`Self::unbatched_slots`] under the same guard.
    pub(super) fn prepare_batch(
        &self,
        slots: Vec<usize>,
        tree: MerkleTree,
        created_at: DateTime<Utc>,
    ) -> Result<PendingBatch> {
        if !self.leaves_match(&slots, &tree) {
            return Err(CoreError::Integrity(
                "tree leaves do not match the batched logs' leaf hashes".to_string(),
            ));
        }

        let id = self.next_batch_id(&created_at);
        let log_ids = slots.iter().map(|&slot| self.logs[slot].id().clone()).collect();
        let batch = EnergyBatch::new(id, created_at, log_ids, tree.root());
        Ok(PendingBatch { slots, batch, tree })
    }

    /// Make a prepared batch visible and mark its logs.
    pub(super) fn apply_batch(&mut self, pending: PendingBatch) -> EnergyBatch {
        let PendingBatch { slots, batch, tree } = pending;
        for &slot in &slots {
            let assigned = self.logs[slot].assign_batch(batch.id().clone());
            debug_assert!(assigned, "slot {slot} was claimed while batched");
            self.unbatched.remove(&slot);
        }

        self.batch_slots.insert(batch.id().clone(), self.batches.len());
        self.batches.push(StoredBatch { batch: batch.clone(), tree: Arc::new(tree) });
        batch
    }

    /// Re-register a batch whose logs were loaded already batched. Every listed
    /// log must exist, name this batch, and hash to the tree's leaves.
    pub(super) fn restore_batch(&mut self, batch: EnergyBatch, tree: MerkleTree) -> Result<()> {
        if self.batch_slots.contains_key(batch.id()) {
            return Err(CoreError::Integrity(format!("batch {} stored twice", batch.id())));
        }

        let slots = batch
            .log_ids()
            .iter()
            .map(|id| {
                let slot = *self.log_slots.get(id).ok_or_else(|| {
                    CoreError::Integrity(format!("batch {} lists unknown log {id}", batch.id()))
                })?;
                if self.logs[slot].batch_id() != Some(batch.id()) {
                    return Err(CoreError::Integrity(format!(
                        "log {id} does not belong to batch {}",
                        batch.id()
                    )));
                }
                Ok(slot)
            })
            .collect::<Result<Vec<_>>>()?;

        if !self.leaves_match(&slots, &tree) || tree.root() != batch.merkle_root() {
            return Err(CoreError::Integrity(format!(
                "tree of batch {} does not match its logs",
                batch.id()
            )));
        }

        self.batch_slots.insert(batch.id().clone(), self.batches.len());
        self.batches.push(StoredBatch { batch, tree: Arc::new(tree) });
        Ok(())
    }

    /// Every batched log must point at a known batch.
    pub(super) fn check_batch_owners(&self) -> Result<()> {
        match self
            .logs
            .iter()
            .find(|log| log.batch_id().is_some_and(|id| !self.batch_slots.contains_key(id)))
        {
            Some(log) => Err(CoreError::Integrity(format!(
                "log {} points at a missing batch",
                log.id()
            ))),
            None => Ok(()),
        }
    }

    fn leaves_match(&self, slots: &[usize], tree: &MerkleTree) -> bool {
        tree.leaf_count() == slots.len() &&
            slots.iter().zip(tree.leaves()).all(|(&slot, leaf)| self.logs[slot].leaf_hash() == *leaf)
    }

    pub(super) fn get_log(&self, id: &LogId) -> Result<EnergyLog> {
        self.log_slots
            .get(id)
            .map(|&slot| self.logs[slot].clone())
            .ok_or_else(|| CoreError::LogNotFound(id.clone()))
    }

    pub(super) fn batch(&self, id: &BatchId) -> Result<&StoredBatch> {
        self.batch_slots
            .get(id)
            .map(|&pos| &self.batches[pos])
            .ok_or_else(|| CoreError::BatchNotFound(id.clone()))
    }

    pub(super) fn unbatched_logs(&self) -> Vec<EnergyLog> {
        self.unbatched.iter().map(|&slot| self.logs[slot].clone()).collect()
    }

    pub(super) fn unbatched_count(&self) -> usize {
        self.unbatched.len()
    }

    pub(super) fn logs(&self) -> &[EnergyLog] {
        &self.logs
    }

    pub(super) fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub(super) fn batches(&self) -> Vec<EnergyBatch> {
        self.batches.iter().map(|stored| stored.batch.clone()).collect()
    }
}
