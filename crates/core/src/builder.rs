//! Batch builder

use chrono::{DateTime, SubsecRound, Utc};
use emlog_merkle::MerkleTree;
use tracing::info;

use crate::{batch::EnergyBatch, error::Result, store::LogStore};

/// Turns every unbatched log into one new batch
#[derive(Debug)]
pub struct BatchBuilder<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: LogStore + ?Sized> BatchBuilder<'a, S> {
    /// Builder over `store`
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Flush now. The creation time is cut to milliseconds, the precision
    /// batches are rendered and persisted with.
    pub fn flush(&self) -> Result<EnergyBatch> {
        self.flush_at(Utc::now().trunc_subsecs(3))
    }

    /// Flush with an explicit creation time.
    ///
    /// Fails with `EmptyBatch`, leaving the store unchanged, when nothing is
    /// waiting.
    pub fn flush_at(&self, created_at: DateTime<Utc>) -> Result<EnergyBatch> {
        let batch = self
            .store
            .seal_unbatched(created_at, &mut |leaves| Ok(MerkleTree::build(leaves.to_vec())?))?;

        info!(
            batch_id = %batch.id(),
            log_count = batch.log_count(),
            merkle_root = %batch.merkle_root(),
            "batch created"
        );
        Ok(batch)
    }
}
