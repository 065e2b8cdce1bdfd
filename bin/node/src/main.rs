//! Energy-log gateway node
//!
//! Serves the ingestion API and a small web page over one process-wide ledger,
//! kept in RocksDB when `EMLOG_DB_PATH` is set and in memory otherwise:
//! - Accepts canonical energy logs and device readings
//! - Flushes unbatched logs into Merkle batches on request
//! - Serves inclusion proofs and verifies detached ones

mod config;
mod error;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use emlog_core::{Ledger, LogStore, MemoryStore, RocksStore};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!("Starting emlog node...");
    info!("  Listen address: {}", config.listen_addr);

    let ledger = Arc::new(Ledger::new(open_store(&config)?));
    let app = routes::router(ledger);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("HTTP server listening on {}", config.listen_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Node stopped");
    Ok(())
}

fn open_store(config: &Config) -> Result<Box<dyn LogStore>> {
    match &config.db_path {
        Some(path) => {
            info!("  Database: {}", path.display());
            let store = RocksStore::open(path)
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            Ok(Box::new(store))
        }
        None => {
            warn!("EMLOG_DB_PATH not set, logs are kept in memory only");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
