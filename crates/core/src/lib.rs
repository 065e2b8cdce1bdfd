//! Energy-log ledger core
//!
//! Accepts metered energy logs, commits each one to a deterministic leaf hash,
//! groups unbatched logs into append-only batches summarized by a Merkle root,
//! and serves inclusion proofs for batched logs.
//!
//! ```text
//! payload ──canonical bytes──▶ leaf hash ──▶ store (unbatched)
//!                                                │ flush
//!                                                ▼
//!                                 batch { log_ids, merkle_root } + tree
//!                                                │ get_proof
//!                                                ▼
//!                                 LogProof { leaf_hash, merkle_root, proof }
//! ```
//!
//! [`Ledger`] is the entry point; [`LogStore`] is the persistence seam.

pub mod batch;
pub mod builder;
pub mod canonical;
pub mod device;
pub mod error;
pub mod leaf;
pub mod ledger;
pub mod log;
pub mod payload;
pub mod store;
pub mod timestamp;
pub mod types;

pub use batch::{AnchorStatus, EnergyBatch};
pub use builder::BatchBuilder;
pub use canonical::{canonical_json, to_canonical_bytes};
pub use device::{DeviceReading, DeviceTopic};
pub use error::{CoreError, Result};
pub use leaf::leaf_hash;
pub use ledger::{Ledger, LogProof};
pub use log::EnergyLog;
pub use payload::{
    EnergyLogPayload, LogStatus, Settlement, SettlementChannel, SettlementStatus, SCHEMA_VERSION,
};
pub use store::{LogStore, MemoryStore};
#[cfg(feature = "rocksdb")]
pub use store::RocksStore;
pub use types::{BatchId, Hash, LogId};

pub use emlog_merkle::{MerkleTree, Position, ProofStep};
