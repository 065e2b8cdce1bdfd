//! Stored energy log

use serde::Serialize;

use crate::{
    payload::EnergyLogPayload,
    types::{BatchId, Hash, LogId},
};

/// A hash-stamped log as held by a store.
///
/// Payload and leaf hash never change after creation. `batch_id` goes from
/// `None` to `Some` exactly once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnergyLog {
    id: LogId,
    #[serde(flatten)]
    payload: EnergyLogPayload,
    leaf_hash: Hash,
    batch_id: Option<BatchId>,
}

impl EnergyLog {
    /// New unbatched log
    pub const fn new(id: LogId, payload: EnergyLogPayload, leaf_hash: Hash) -> Self {
        Self { id, payload, leaf_hash, batch_id: None }
    }

    /// Log as it was persisted, possibly already batched
    pub(crate) const fn from_parts(
        id: LogId,
        payload: EnergyLogPayload,
        leaf_hash: Hash,
        batch_id: Option<BatchId>,
    ) -> Self {
        Self { id, payload, leaf_hash, batch_id }
    }

    /// Log id
    pub const fn id(&self) -> &LogId {
        &self.id
    }

    /// Canonical payload
    pub const fn payload(&self) -> &EnergyLogPayload {
        &self.payload
    }

    /// Leaf hash of the payload
    pub const fn leaf_hash(&self) -> Hash {
        self.leaf_hash
    }

    /// Owning batch, once batched
    pub const fn batch_id(&self) -> Option<&BatchId> {
        self.batch_id.as_ref()
    }

    /// Whether the log belongs to a batch
    pub const fn is_batched(&self) -> bool {
        self.batch_id.is_some()
    }

    /// Record the owning batch. Returns false and leaves the log untouched if it
    /// already has one.
    pub(crate) fn assign_batch(&mut self, batch_id: BatchId) -> bool {
        if self.batch_id.is_some() {
            return false;
        }
        self.batch_id = Some(batch_id);
        true
    }
}
