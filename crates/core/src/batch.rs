//! Batch record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    timestamp,
    types::{BatchId, Hash, LogId},
};

/// Anchoring progress of a batch root
///
/// Written by an anchoring component outside this crate; batches created here
/// always start and stay [`AnchorStatus::Pending`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    /// Not anchored
    #[default]
    Pending,
    /// Root committed externally
    Anchored,
    /// Anchoring attempt failed
    Failed,
}

/// An append-only group of logs summarized by a Merkle root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyBatch {
    id: BatchId,
    #[serde(with = "timestamp")]
    created_at: DateTime<Utc>,
    log_ids: Vec<LogId>,
    merkle_root: Hash,
    log_count: usize,
    anchor_status: AnchorStatus,
    anchor_txid: Option<String>,
    anchor_block_hash: Option<String>,
    anchor_block_height: Option<u64>,
    #[serde(with = "timestamp::option")]
    anchor_block_time: Option<DateTime<Utc>>,
}

impl EnergyBatch {
    /// New pending batch over `log_ids` in order
    pub fn new(
        id: BatchId,
        created_at: DateTime<Utc>,
        log_ids: Vec<LogId>,
        merkle_root: Hash,
    ) -> Self {
        Self {
            id,
            created_at,
            log_count: log_ids.len(),
            log_ids,
            merkle_root,
            anchor_status: AnchorStatus::Pending,
            anchor_txid: None,
            anchor_block_hash: None,
            anchor_block_height: None,
            anchor_block_time: None,
        }
    }

    /// Batch id
    pub const fn id(&self) -> &BatchId {
        &self.id
    }

    /// Creation time
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Included logs, in leaf order
    pub fn log_ids(&self) -> &[LogId] {
        &self.log_ids
    }

    /// Merkle root over the logs' leaf hashes
    pub const fn merkle_root(&self) -> Hash {
        self.merkle_root
    }

    /// Number of logs
    pub const fn log_count(&self) -> usize {
        self.log_count
    }

    /// Leaf position of `log_id` in this batch
    pub fn index_of(&self, log_id: &LogId) -> Option<usize> {
        self.log_ids.iter().position(|id| id == log_id)
    }

    /// Anchoring status
    pub const fn anchor_status(&self) -> AnchorStatus {
        self.anchor_status
    }

    /// External anchor transaction, if any
    pub fn anchor_txid(&self) -> Option<&str> {
        self.anchor_txid.as_deref()
    }

    /// External anchor block hash, if any
    pub fn anchor_block_hash(&self) -> Option<&str> {
        self.anchor_block_hash.as_deref()
    }

    /// External anchor block height, if any
    pub const fn anchor_block_height(&self) -> Option<u64> {
        self.anchor_block_height
    }

    /// External anchor block time, if any
    pub const fn anchor_block_time(&self) -> Option<DateTime<Utc>> {
        self.anchor_block_time
    }
}
