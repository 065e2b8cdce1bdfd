//! Canonical JSON encoding
//!
//! - Object keys sorted by byte order at every nesting level
//! - Arrays keep their order
//! - No insignificant whitespace
//! - Numbers in `serde_json`'s shortest round-trip form; negative zero is
//!   written as `0.0`
//! - Strings escaped the way `serde_json` escapes them, non-ASCII left as UTF-8
//! - `null` values are kept, so `{"a": null}` and `{}` encode differently
//!
//! Changing any of these rules changes every leaf hash, so the rules are tied
//! to [`crate::payload::SCHEMA_VERSION`].

use serde::{ser, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// Canonical bytes of any serializable value.
///
/// Fails with [`CoreError::Canonicalization`] if the value holds a NaN or an
/// infinite float; JSON has no encoding for them.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    value.serialize(FiniteCheck).map_err(|err| CoreError::Canonicalization(err.0))?;
    canonical_json(&serde_json::to_value(value)?)
}

/// Canonical bytes of a JSON value. A [`Value`] cannot hold non-finite numbers.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(out, item)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Number(n) if n.is_f64() && n.as_f64() == Some(0.0) => {
            // also catches -0.0
            out.extend_from_slice(b"0.0");
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct CheckError(String);

impl ser::Error for CheckError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// Walks a value and fails on the first non-finite float; produces nothing.
struct FiniteCheck;

impl FiniteCheck {
    fn float(value: f64) -> std::result::Result<(), CheckError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(CheckError(format!("non-finite float {value} cannot be canonicalized")))
        }
    }
}

macro_rules! accept_scalars {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, _: $ty) -> std::result::Result<(), CheckError> {
                Ok(())
            }
        )*
    };
}

impl ser::Serializer for FiniteCheck {
    type Ok = ();
    type Error = CheckError;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    accept_scalars! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8],
        serialize_unit_struct: &'static str,
    }

    fn serialize_f32(self, v: f32) -> std::result::Result<(), CheckError> {
        Self::float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> std::result::Result<(), CheckError> {
        Self::float(v)
    }

    fn serialize_none(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> std::result::Result<(), CheckError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> std::result::Result<(), CheckError> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        value: &T,
    ) -> std::result::Result<(), CheckError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> std::result::Result<(), CheckError> {
        value.serialize(self)
    }

    fn serialize_seq(self, _: Option<usize>) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple(self, _: usize) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_map(self, _: Option<usize>) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_struct(self, _: &'static str, _: usize) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> std::result::Result<Self, CheckError> {
        Ok(self)
    }
}

impl ser::SerializeSeq for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeTuple for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeMap for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> std::result::Result<(), CheckError> {
        key.serialize(Self)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeStruct for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FiniteCheck {
    type Ok = ();
    type Error = CheckError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _: &'static str,
        value: &T,
    ) -> std::result::Result<(), CheckError> {
        value.serialize(Self)
    }

    fn end(self) -> std::result::Result<(), CheckError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::tests::sample_payload;
    use serde_json::json;

    fn encode(value: Value) -> String {
        String::from_utf8(canonical_json(&value).unwrap()).unwrap()
    }

    #[test]
    fn test_keys_sorted_recursively() {
        let out = encode(json!({"b": 1, "a": {"z": [3, 1, 2], "y": "x"}}));
        assert_eq!(out, r#"{"a":{"y":"x","z":[3,1,2]},"b":1}"#);
    }

    #[test]
    fn test_construction_order_irrelevant() {
        let mut first = serde_json::Map::new();
        first.insert("site".into(), json!("s"));
        first.insert("kwh".into(), json!(1.25));
        let mut second = serde_json::Map::new();
        second.insert("kwh".into(), json!(1.25));
        second.insert("site".into(), json!("s"));

        assert_eq!(
            canonical_json(&Value::Object(first)).unwrap(),
            canonical_json(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(encode(json!({"f": 1.0, "i": 1, "n": -0.0, "x": 0.1})), r#"{"f":1.0,"i":1,"n":0.0,"x":0.1}"#);
    }

    #[test]
    fn test_null_and_absent_differ_for_raw_json() {
        assert_ne!(encode(json!({"a": 1, "b": null})), encode(json!({"a": 1})));
    }

    #[test]
    fn test_typed_payload_null_and_absent_equivalent() {
        let mut with_null = serde_json::to_value(sample_payload("m", 2.0)).unwrap();
        with_null["power_kw_avg"] = Value::Null;
        let mut without = with_null.clone();
        without.as_object_mut().unwrap().remove("power_kw_avg");

        let a: crate::EnergyLogPayload = serde_json::from_value(with_null).unwrap();
        let b: crate::EnergyLogPayload = serde_json::from_value(without).unwrap();
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());

        let text = String::from_utf8(a.canonical_bytes().unwrap()).unwrap();
        assert!(text.contains(r#""power_kw_avg":null"#));
    }

    #[derive(Serialize)]
    struct Reading {
        kwh: f64,
        avg: Option<f32>,
        series: Vec<f64>,
    }

    #[test]
    fn test_non_finite_rejected_for_any_value() {
        assert!(matches!(to_canonical_bytes(&f64::NAN), Err(CoreError::Canonicalization(_))));

        let cases = [
            Reading { kwh: f64::INFINITY, avg: None, series: vec![] },
            Reading { kwh: 1.0, avg: Some(f32::NEG_INFINITY), series: vec![] },
            Reading { kwh: 1.0, avg: None, series: vec![0.5, f64::NAN] },
        ];
        for reading in &cases {
            assert!(matches!(to_canonical_bytes(reading), Err(CoreError::Canonicalization(_))));
        }

        let finite = Reading { kwh: 1.5, avg: None, series: vec![2.0] };
        assert_eq!(to_canonical_bytes(&finite).unwrap(), br#"{"avg":null,"kwh":1.5,"series":[2.0]}"#);
    }

    #[test]
    fn test_payload_encoding_pinned() {
        let text = String::from_utf8(sample_payload("m-1", 2.5).canonical_bytes().unwrap()).unwrap();
        assert_eq!(
            text,
            concat!(
                r#"{"energy_kwh":2.5,"interval_s":900,"iot_device_id":"gw-1","meter_id":"m-1","#,
                r#""power_kw_avg":null,"schema_version":"emlog-1.1","site_id":"site-1","status":"ok","#,
                r#""tags":[],"ts_end":"2025-03-01T00:15:00.000Z","ts_start":"2025-03-01T00:00:00.000Z","#,
                r#""tx":{"amount_sats":3000,"bitcoin_txid":null,"channel":"ln","ln_invoice_id":null,"#,
                r#""price_sats_per_kwh":1200,"settlement_status":"pending","unit":"sats"}}"#,
            )
        );
    }
}
