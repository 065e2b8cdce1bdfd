//! Offline inclusion-proof verifier
//!
//! Checks a proof saved from `GET /api/v1/logs/:log_id/proof` without talking
//! to the node:
//!
//! ```text
//! emlog-verifier proof.json
//! ```
//!
//! Exit code 0 means the proof is valid for its root; 1 means invalid or the
//! document could not be read.

use std::{env, fs, path::Path, process::ExitCode};

use anyhow::{bail, Context, Result};
use emlog_merkle::{verify, Hash, ProofStep};
use serde::Deserialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// The fields of a proof document needed for verification. Other fields, such
/// as `log_id` and `batch_id`, are ignored.
#[derive(Debug, Deserialize)]
struct ProofDocument {
    leaf_hash: Hash,
    merkle_root: Hash,
    proof: Vec<ProofStep>,
}

impl ProofDocument {
    fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .context("invalid proof JSON: expected leaf_hash, merkle_root and proof[]")
    }

    fn verify(&self) -> bool {
        verify(&self.leaf_hash, &self.proof, &self.merkle_root)
    }
}

fn load(path: &Path) -> Result<ProofDocument> {
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    ProofDocument::parse(&text)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = env::args().collect();
    let [_, path] = args.as_slice() else {
        eprintln!("Usage: emlog-verifier <proof.json>");
        return ExitCode::FAILURE;
    };

    let doc = match load(Path::new(path)) {
        Ok(doc) => doc,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };
    debug!(steps = doc.proof.len(), root = %doc.merkle_root, "verifying proof");

    if doc.verify() {
        println!("Merkle proof is VALID for the given root.");
        ExitCode::SUCCESS
    } else {
        println!("Merkle proof is INVALID for the given root.");
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emlog_merkle::{MerkleTree, Sha256Hasher};
    use serde_json::json;

    fn three_leaf_proof() -> serde_json::Value {
        let leaves: Vec<Hash> = [b"a", b"b", b"c"].iter().map(|b| Sha256Hasher::hash_leaf(*b)).collect();
        let tree = MerkleTree::build(leaves.clone()).unwrap();
        json!({
            "log_id": "log_000000000003",
            "batch_id": "batch_2025-03-01T00-00-00_0001",
            "index": 2,
            "leaf_hash": leaves[2],
            "merkle_root": tree.root(),
            "proof": tree.prove(2).unwrap().steps,
        })
    }

    #[test]
    fn test_valid_document() {
        let doc = ProofDocument::parse(&three_leaf_proof().to_string()).unwrap();
        assert_eq!(doc.proof.len(), 1);
        assert!(doc.verify());
    }

    #[test]
    fn test_tampered_root() {
        let mut value = three_leaf_proof();
        value["merkle_root"] = json!("00".repeat(32));
        let doc = ProofDocument::parse(&value.to_string()).unwrap();
        assert!(!doc.verify());
    }

    #[test]
    fn test_flipped_position() {
        let mut value = three_leaf_proof();
        value["proof"][0]["position"] = json!("right");
        let doc = ProofDocument::parse(&value.to_string()).unwrap();
        assert!(!doc.verify());
    }

    #[test]
    fn test_malformed_documents() {
        let mut missing = three_leaf_proof();
        missing.as_object_mut().unwrap().remove("proof");
        assert!(ProofDocument::parse(&missing.to_string()).is_err());

        let mut not_list = three_leaf_proof();
        not_list["proof"] = json!("nope");
        assert!(ProofDocument::parse(&not_list.to_string()).is_err());

        let mut bad_hex = three_leaf_proof();
        bad_hex["leaf_hash"] = json!("xyz");
        assert!(ProofDocument::parse(&bad_hex.to_string()).is_err());

        assert!(ProofDocument::parse("not json").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load(Path::new("/nonexistent/emlog/proof.json")).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }
}
