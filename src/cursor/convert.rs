//! Pluggable conversion between in-flight cursor values and the durable
//! state-value representation. Conversions must round-trip exactly.

use crate::error::{Result, SyncError};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

pub trait CursorValueConverter: Send + Sync {
    /// Convert an in-flight cursor value to its durable representation.
    fn to_state(&self, value: &Value) -> Result<Value>;

    /// Convert a durable state value back to the in-flight representation.
    fn from_state(&self, value: &Value) -> Result<Value>;
}

/// Converter that stores cursor values verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityConverter;

impl CursorValueConverter for IdentityConverter {
    fn to_state(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }

    fn from_state(&self, value: &Value) -> Result<Value> {
        Ok(value.clone())
    }
}

/// Converter between integer epoch-seconds cursor values and ISO-8601
/// timestamp strings in durable state (legacy state format).
#[derive(Debug, Default, Clone, Copy)]
pub struct EpochSecondsConverter;

impl CursorValueConverter for EpochSecondsConverter {
    fn to_state(&self, value: &Value) -> Result<Value> {
        let secs = value.as_i64().ok_or_else(|| {
            SyncError::Invariant(format!("epoch cursor value is not an integer: {value}"))
        })?;
        let ts = Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
            SyncError::Invariant(format!("epoch cursor value out of range: {secs}"))
        })?;
        Ok(Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
    }

    fn from_state(&self, value: &Value) -> Result<Value> {
        let text = value.as_str().ok_or_else(|| {
            SyncError::Invariant(format!("state cursor value is not a string: {value}"))
        })?;
        let ts = DateTime::parse_from_rfc3339(text).map_err(|e| {
            SyncError::Invariant(format!("state cursor value '{text}' is not ISO-8601: {e}"))
        })?;
        Ok(Value::from(ts.timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_roundtrip() {
        let converter = IdentityConverter;
        let value = json!("2024-01-01");
        assert_eq!(converter.to_state(&value).unwrap(), value);
        assert_eq!(converter.from_state(&value).unwrap(), value);
    }

    #[test]
    fn test_epoch_to_iso8601() {
        let converter = EpochSecondsConverter;
        let state = converter.to_state(&json!(1700000000)).unwrap();
        assert_eq!(state, json!("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_epoch_roundtrip_exact() {
        let converter = EpochSecondsConverter;
        for secs in [0i64, 1, 1700000000, -1] {
            let state = converter.to_state(&json!(secs)).unwrap();
            assert_eq!(converter.from_state(&state).unwrap(), json!(secs));
        }
    }

    #[test]
    fn test_epoch_rejects_non_integer() {
        let converter = EpochSecondsConverter;
        assert!(converter.to_state(&json!("not a number")).is_err());
        assert!(converter.from_state(&json!(42)).is_err());
    }
}
