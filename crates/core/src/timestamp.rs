//! Fixed textual form for UTC timestamps: `YYYY-MM-DDTHH:MM:SS.mmmZ`
//!
//! Used with `#[serde(with = "crate::timestamp")]`. Any RFC 3339 offset is
//! accepted on input and normalized to UTC.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Render `ts` in the canonical form.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp into UTC.
pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|ts| ts.with_timezone(&Utc))
}

/// True when `ts` has no precision below one millisecond, so the canonical
/// form renders it without loss.
pub fn is_millisecond_precise(ts: &DateTime<Utc>) -> bool {
    ts.timestamp_subsec_nanos() % 1_000_000 == 0
}

/// Serialize in the canonical form.
pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

/// Deserialize from any RFC 3339 string.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(de::Error::custom)
}

/// Same format for optional timestamps; `None` is `null`.
pub mod option {
    use super::*;

    /// Serialize an optional timestamp.
    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_some(&format(ts)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| parse(&s).map_err(de::Error::custom))
            .transpose()
    }
}
