//! Device message mapping
//!
//! Meters publish readings on `energy/<site_id>/<iot_device_id>/<meter_id>`.
//! The topic carries the identity and the body carries the measurement; this
//! module combines both into a canonical [`EnergyLogPayload`]. The transport
//! itself lives outside this crate.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, Result},
    payload::{
        EnergyLogPayload, LogStatus, Settlement, SettlementChannel, SettlementStatus,
        SCHEMA_VERSION,
    },
    timestamp,
};

const TOPIC_ROOT: &str = "energy";

/// Identity parsed from a device topic
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceTopic {
    /// Site identifier
    pub site_id: String,
    /// Gateway device identifier
    pub iot_device_id: String,
    /// Meter identifier
    pub meter_id: String,
}

impl DeviceTopic {
    /// Parse `energy/<site_id>/<iot_device_id>/<meter_id>`.
    pub fn parse(topic: &str) -> Result<Self> {
        let parts: Vec<&str> = topic.split('/').collect();
        match parts.as_slice() {
            [TOPIC_ROOT, site, device, meter]
                if [site, device, meter].iter().all(|part| !part.is_empty()) =>
            {
                Ok(Self {
                    site_id: (*site).to_string(),
                    iot_device_id: (*device).to_string(),
                    meter_id: (*meter).to_string(),
                })
            }
            _ => Err(CoreError::Validation(format!("unsupported topic format: {topic}"))),
        }
    }
}

impl FromStr for DeviceTopic {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TOPIC_ROOT}/{}/{}/{}", self.site_id, self.iot_device_id, self.meter_id)
    }
}

/// Measurement body published by a meter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
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
    /// Average power, if the meter reports it
    #[serde(default)]
    pub power_kw_avg: Option<f64>,
    /// Price applied to the interval
    pub price_sats_per_kwh: u64,
    /// Reading quality
    #[serde(default)]
    pub status: LogStatus,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DeviceReading {
    /// Build the validated canonical payload for a reading received on `topic`.
    ///
    /// Settlement starts as a pending Lightning payment in sats with no external
    /// references; the amount is the energy times the price, rounded half to even.
    pub fn into_payload(self, topic: &DeviceTopic) -> Result<EnergyLogPayload> {
        if !self.energy_kwh.is_finite() || self.energy_kwh < 0.0 {
            return Err(CoreError::Validation("energy_kwh must be a finite value >= 0".to_string()));
        }

        let payload = EnergyLogPayload {
            schema_version: SCHEMA_VERSION.to_string(),
            site_id: topic.site_id.clone(),
            iot_device_id: topic.iot_device_id.clone(),
            meter_id: topic.meter_id.clone(),
            ts_start: self.ts_start,
            ts_end: self.ts_end,
            interval_s: self.interval_s,
            energy_kwh: self.energy_kwh,
            power_kw_avg: self.power_kw_avg,
            status: self.status,
            tags: self.tags,
            tx: Settlement {
                unit: "sats".to_string(),
                price_sats_per_kwh: self.price_sats_per_kwh,
                amount_sats: amount_sats(self.energy_kwh, self.price_sats_per_kwh)?,
                channel: SettlementChannel::Ln,
                settlement_status: SettlementStatus::Pending,
                ln_invoice_id: None,
                bitcoin_txid: None,
            },
        };
        payload.validate()?;
        Ok(payload)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn amount_sats(energy_kwh: f64, price_sats_per_kwh: u64) -> Result<u64> {
    let amount = (energy_kwh * price_sats_per_kwh as f64).round_ties_even();
    if amount >= u64::MAX as f64 {
        return Err(CoreError::Validation("settlement amount overflows".to_string()));
    }
    Ok(amount as u64)
}
