//! Canonical energy log schema (`emlog-1.1`)
//!
//! Field names are part of the hash and must not change within a schema
//! version. Optional fields are always serialized, as `null` when absent, so a
//! request that omits `power_kw_avg` and one that sends `"power_kw_avg": null`
//! produce the same payload and the same leaf hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    canonical,
    error::{CoreError, Result},
    timestamp,
};

/// Schema tag this build canonicalizes
pub const SCHEMA_VERSION: &str = "emlog-1.1";

/// Quality flag reported by the meter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// Measured reading
    #[default]
    Ok,
    /// Interpolated or estimated reading
    Estimated,
    /// Meter reported a fault
    Error,
}

/// Settlement channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementChannel {
    /// Lightning Network
    #[default]
    Ln,
    /// Bitcoin on-chain
    Onchain,
    /// Internal ledger
    Internal,
}

/// Settlement progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// Not settled yet
    #[default]
    Pending,
    /// Paid
    Settled,
    /// Payment failed
    Failed,
}

/// Economic view of an energy interval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settlement {
    /// Pricing unit, e.g. `sats`
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Price per kWh
    pub price_sats_per_kwh: u64,
    /// Total amount for the interval
    pub amount_sats: u64,
    /// Settlement channel
    #[serde(default)]
    pub channel: SettlementChannel,
    /// Settlement progress
    #[serde(default)]
    pub settlement_status: SettlementStatus,
    /// Lightning invoice reference
    #[serde(default)]
    pub ln_invoice_id: Option<String>,
    /// On-chain transaction reference
    #[serde(default)]
    pub bitcoin_txid: Option<String>,
}

fn default_unit() -> String {
    "sats".to_string()
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// One metered interval, as submitted by a client or built from a device reading
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyLogPayload {
    /// Schema tag, also the canonical encoding version
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Site identifier
    pub site_id: String,
    /// Gateway device identifier
    pub iot_device_id: String,
    /// Meter identifier
    pub meter_id: String,
    /// Interval start
    #[serde(with = "timestamp")]
    pub ts_start: DateTime<Utc>,
    /// Interval end
    #[serde(with = "timestamp")]
    pub ts_end: DateTime<Utc>,
    /// Interval length in seconds
    pub interval_s: u64,
    /// Energy over the interval
    pub energy_kwh: f64,
    /// Average power over the interval
    #[serde(default)]
    pub power_kw_avg: Option<f64>,
    /// Reading quality
    #[serde(default)]
    pub status: LogStatus,
    /// Free-form tags, order preserved
    #[serde(default)]
    pub tags: Vec<String>,
    /// Settlement sub-record
    pub tx: Settlement,
}

impl EnergyLogPayload {
    /// Deterministic bytes for hashing. See [`canonical`].
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical::to_canonical_bytes(self)
    }

    /// Structural checks applied by the ingestion surface before a payload
    /// reaches the ledger.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(invalid(format!(
                "unsupported schema_version {:?}, expected {SCHEMA_VERSION:?}",
                self.schema_version
            )));
        }

        for (name, value) in [
            ("site_id", &self.site_id),
            ("iot_device_id", &self.iot_device_id),
            ("meter_id", &self.meter_id),
            ("tx.unit", &self.tx.unit),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{name} must not be empty")));
            }
        }

        if self.interval_s == 0 {
            return Err(invalid("interval_s must be greater than zero"));
        }
        if self.ts_end < self.ts_start {
            return Err(invalid("ts_end must not be before ts_start"));
        }
        for (name, ts) in [("ts_start", &self.ts_start), ("ts_end", &self.ts_end)] {
            if !timestamp::is_millisecond_precise(ts) {
                return Err(invalid(format!("{name} has sub-millisecond precision")));
            }
        }

        if !self.energy_kwh.is_finite() || self.energy_kwh < 0.0 {
            return Err(invalid("energy_kwh must be a finite value >= 0"));
        }
        if let Some(power) = self.power_kw_avg {
            if !power.is_finite() {
                return Err(invalid("power_kw_avg must be finite"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::Validation(msg.into())
}
