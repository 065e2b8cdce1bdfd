//! HTTP routes
//!
//! - `GET  /` single-page UI over the list and flush routes
//! - `GET  /health`
//! - `POST /api/v1/logs`, `GET /api/v1/logs`, `GET /api/v1/logs/:log_id`
//! - `GET  /api/v1/logs/:log_id/proof`
//! - `POST /api/v1/batches/flush`, `GET /api/v1/batches`, `GET /api/v1/batches/:batch_id`
//! - `POST /api/v1/proofs/verify`
//! - `POST /api/v1/devices/readings`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use emlog_core::{
    timestamp, BatchId, DeviceReading, DeviceTopic, EnergyBatch, EnergyLog, EnergyLogPayload,
    Hash, Ledger, LogId, LogProof, LogStore, ProofStep,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;

/// Ledger over whichever store the node was configured with
pub(crate) type NodeLedger = Ledger<Box<dyn LogStore>>;

/// Ledger shared by all handlers
pub(crate) type SharedLedger = Arc<NodeLedger>;

const INDEX_HTML: &str = include_str!("index.html");

type JsonBody<T> = Result<Json<T>, JsonRejection>;

/// Build the router over `ledger`.
pub(crate) fn router(ledger: SharedLedger) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/v1/logs", get(list_logs).post(create_log))
        .route("/api/v1/logs/:log_id", get(get_log))
        .route("/api/v1/logs/:log_id/proof", get(get_proof))
        .route("/api/v1/batches", get(list_batches))
        .route("/api/v1/batches/flush", post(flush_batch))
        .route("/api/v1/batches/:batch_id", get(get_batch))
        .route("/api/v1/proofs/verify", post(verify_proof))
        .route("/api/v1/devices/readings", post(ingest_reading))
        .with_state(ledger)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    time: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", time: timestamp::format(&Utc::now()) })
}

fn ingest(ledger: &NodeLedger, payload: EnergyLogPayload) -> Result<EnergyLog, ApiError> {
    payload.validate()?;
    let id = ledger.insert_log(payload)?;
    let log = ledger.get_log(&id)?;
    info!(log_id = %id, meter_id = %log.payload().meter_id, "log ingested");
    Ok(log)
}

async fn create_log(
    State(ledger): State<SharedLedger>,
    body: JsonBody<EnergyLogPayload>,
) -> Result<Json<EnergyLog>, ApiError> {
    let Json(payload) = body?;
    ingest(&ledger, payload).map(Json)
}

async fn list_logs(State(ledger): State<SharedLedger>) -> Result<Json<Vec<EnergyLog>>, ApiError> {
    Ok(Json(ledger.list_logs()?))
}

async fn get_log(
    State(ledger): State<SharedLedger>,
    Path(log_id): Path<LogId>,
) -> Result<Json<EnergyLog>, ApiError> {
    Ok(Json(ledger.get_log(&log_id)?))
}

async fn get_proof(
    State(ledger): State<SharedLedger>,
    Path(log_id): Path<LogId>,
) -> Result<Json<LogProof>, ApiError> {
    Ok(Json(ledger.get_proof(&log_id)?))
}

async fn flush_batch(State(ledger): State<SharedLedger>) -> Result<Json<EnergyBatch>, ApiError> {
    Ok(Json(ledger.flush()?))
}

async fn list_batches(
    State(ledger): State<SharedLedger>,
) -> Result<Json<Vec<EnergyBatch>>, ApiError> {
    Ok(Json(ledger.list_batches()?))
}

async fn get_batch(
    State(ledger): State<SharedLedger>,
    Path(batch_id): Path<BatchId>,
) -> Result<Json<EnergyBatch>, ApiError> {
    Ok(Json(ledger.get_batch(&batch_id)?))
}

/// Detached proof, as produced by the proof route or stored by a client
#[derive(Debug, Deserialize)]
struct VerifyRequest {
    leaf_hash: Hash,
    merkle_root: Hash,
    proof: Vec<ProofStep>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VerifyResponse {
    valid: bool,
}

async fn verify_proof(
    State(ledger): State<SharedLedger>,
    body: JsonBody<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(req) = body?;
    let valid = ledger.verify_proof(&req.leaf_hash, &req.proof, &req.merkle_root);
    Ok(Json(VerifyResponse { valid }))
}

/// A device message as relayed by a transport bridge
#[derive(Debug, Deserialize)]
struct DeviceMessage {
    topic: String,
    reading: DeviceReading,
}

async fn ingest_reading(
    State(ledger): State<SharedLedger>,
    body: JsonBody<DeviceMessage>,
) -> Result<Json<EnergyLog>, ApiError> {
    let Json(msg) = body?;
    let topic = DeviceTopic::parse(&msg.topic)?;
    let payload = msg.reading.into_payload(&topic)?;
    ingest(&ledger, payload).map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };
    use emlog_core::{MemoryStore, RocksStore};
    use serde_json::{json, Value};

    fn ledger() -> SharedLedger {
        let store: Box<dyn LogStore> = Box::new(MemoryStore::new());
        Arc::new(Ledger::new(store))
    }

    fn durable_ledger(dir: &tempfile::TempDir) -> SharedLedger {
        let store: Box<dyn LogStore> = Box::new(RocksStore::open(dir.path()).unwrap());
        Arc::new(Ledger::new(store))
    }

    /// Run the JSON extractor over a raw body and keep its rejection.
    async fn rejection(body: &str) -> JsonRejection {
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/logs")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        Json::<EnergyLogPayload>::from_request(req, &()).await.unwrap_err()
    }

    fn payload(meter: &str) -> EnergyLogPayload {
        serde_json::from_value(json!({
            "schema_version": "emlog-1.1",
            "site_id": "site-1",
            "iot_device_id": "gw-1",
            "meter_id": meter,
            "ts_start": "2025-03-01T00:00:00Z",
            "ts_end": "2025-03-01T00:15:00Z",
            "interval_s": 900,
            "energy_kwh": 1.25,
            "power_kw_avg": 5.0,
            "tags": ["pv"],
            "tx": { "price_sats_per_kwh": 1000, "amount_sats": 1250 }
        }))
        .unwrap()
    }

    async fn post_log(ledger: &SharedLedger, meter: &str) -> EnergyLog {
        let Json(log) = create_log(State(ledger.clone()), Ok(Json(payload(meter)))).await.unwrap();
        log
    }

    #[test]
    fn test_router_builds() {
        let _ = router(ledger());
    }

    #[tokio::test]
    async fn test_index_page() {
        let Html(page) = index().await;
        assert!(page.starts_with("<!doctype html>"));
        assert!(page.contains("/api/v1/logs"));
        assert!(page.contains("/api/v1/batches"));
        assert!(page.contains("/api/v1/batches/flush"));
    }

    #[tokio::test]
    async fn test_health() {
        let Json(resp) = health().await;
        assert_eq!(resp.status, "ok");
        assert!(resp.time.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_create_log_returns_stored_log() {
        let ledger = ledger();
        let log = post_log(&ledger, "m-1").await;
        assert!(log.id().as_str().starts_with("log_"));
        assert!(!log.is_batched());

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["meter_id"], "m-1");
        assert_eq!(json["batch_id"], Value::Null);
        assert_eq!(json["leaf_hash"].as_str().unwrap().len(), 64);

        let Json(listed) = list_logs(State(ledger.clone())).await.unwrap();
        assert_eq!(listed, vec![log.clone()]);
        let Json(fetched) = get_log(State(ledger), Path(log.id().clone())).await.unwrap();
        assert_eq!(fetched, log);
    }

    #[tokio::test]
    async fn test_create_log_rejects_invalid_payload() {
        let ledger = ledger();
        let mut bad = payload("m-1");
        bad.interval_s = 0;

        let err = create_log(State(ledger.clone()), Ok(Json(bad))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(ledger.list_logs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_unprocessable() {
        let ledger = ledger();
        let mut unknown_field = serde_json::to_value(payload("m-1")).unwrap();
        unknown_field["surprise"] = json!(1);
        let mut wrong_type = serde_json::to_value(payload("m-1")).unwrap();
        wrong_type["energy_kwh"] = json!("lots");

        for body in [unknown_field.to_string(), wrong_type.to_string()] {
            let rejection = rejection(&body).await;
            assert!(matches!(rejection, JsonRejection::JsonDataError(_)));
            let err = create_log(State(ledger.clone()), Err(rejection)).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
            assert!(matches!(err, ApiError::Core(emlog_core::CoreError::Validation(_))));
        }
        assert!(ledger.list_logs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let rejection = rejection("{\"site_id\": ").await;
        assert!(matches!(rejection, JsonRejection::JsonSyntaxError(_)));
        let err = create_log(State(ledger()), Err(rejection)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_durable_ledger_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let (log, batch) = {
            let ledger = durable_ledger(&dir);
            let log = post_log(&ledger, "m-1").await;
            let Json(batch) = flush_batch(State(ledger)).await.unwrap();
            (log, batch)
        };

        let ledger = durable_ledger(&dir);
        let Json(batches) = list_batches(State(ledger.clone())).await.unwrap();
        assert_eq!(batches, vec![batch.clone()]);
        let Json(proof) = get_proof(State(ledger), Path(log.id().clone())).await.unwrap();
        assert_eq!(proof.merkle_root, batch.merkle_root());
        assert!(proof.verify());
    }

    #[tokio::test]
    async fn test_flush_and_prove() {
        let ledger = ledger();
        let first = post_log(&ledger, "a").await;
        post_log(&ledger, "b").await;
        post_log(&ledger, "c").await;

        let err = get_proof(State(ledger.clone()), Path(first.id().clone())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let Json(batch) = flush_batch(State(ledger.clone())).await.unwrap();
        assert_eq!(batch.log_count(), 3);

        let Json(proof) = get_proof(State(ledger.clone()), Path(first.id().clone())).await.unwrap();
        assert_eq!(proof.merkle_root, batch.merkle_root());

        let req: VerifyRequest =
            serde_json::from_value(serde_json::to_value(&proof).unwrap()).unwrap();
        let Json(resp) = verify_proof(State(ledger.clone()), Ok(Json(req))).await.unwrap();
        assert!(resp.valid);

        let Json(fetched) = get_batch(State(ledger.clone()), Path(batch.id().clone())).await.unwrap();
        assert_eq!(fetched, batch);
        let Json(batches) = list_batches(State(ledger)).await.unwrap();
        assert_eq!(batches.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_root() {
        let ledger = ledger();
        let log = post_log(&ledger, "a").await;
        ledger.flush().unwrap();
        let proof = ledger.get_proof(log.id()).unwrap();

        let req = VerifyRequest {
            leaf_hash: proof.leaf_hash,
            merkle_root: Hash::from_bytes([9u8; 32]),
            proof: proof.proof,
        };
        let Json(resp) = verify_proof(State(ledger), Ok(Json(req))).await.unwrap();
        assert!(!resp.valid);
    }

    #[tokio::test]
    async fn test_empty_flush_is_bad_request() {
        let err = flush_batch(State(ledger())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_ids_not_found() {
        let ledger = ledger();
        let err = get_log(State(ledger.clone()), Path(LogId::from("log_nope"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err = get_proof(State(ledger.clone()), Path(LogId::from("log_nope"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err =
            get_batch(State(ledger), Path(BatchId::from("batch_nope"))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_device_reading_ingested() {
        let ledger = ledger();
        let msg: DeviceMessage = serde_json::from_value(json!({
            "topic": "energy/site-1/gw-1/m-9",
            "reading": {
                "ts_start": "2025-03-01T00:00:00Z",
                "ts_end": "2025-03-01T00:15:00Z",
                "interval_s": 900,
                "energy_kwh": 0.5,
                "price_sats_per_kwh": 1500
            }
        }))
        .unwrap();

        let Json(log) = ingest_reading(State(ledger.clone()), Ok(Json(msg))).await.unwrap();
        assert_eq!(log.payload().meter_id, "m-9");
        assert_eq!(log.payload().tx.amount_sats, 750);
        assert_eq!(ledger.unbatched_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_device_reading_bad_topic() {
        let msg: DeviceMessage = serde_json::from_value(json!({
            "topic": "power/site-1/gw-1",
            "reading": {
                "ts_start": "2025-03-01T00:00:00Z",
                "ts_end": "2025-03-01T00:15:00Z",
                "interval_s": 900,
                "energy_kwh": 0.5,
                "price_sats_per_kwh": 1500
            }
        }))
        .unwrap();

        let err = ingest_reading(State(ledger()), Ok(Json(msg))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
