//! JSON shapes exchanged with the service, and their mapping to the domain
//! model.
//!
//! Times travel as seconds since the Unix epoch: integers for `t1`, `t2` and
//! `mt`, a float for the server-assigned `st`. Going out, `st` is always `0`
//! and an open-ended record is sent with the far-future sentinel as `t2`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{Record, Setting, WriteResult};

/// 9999-12-31T23:59:59Z, the largest instant the service round-trips.
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum WireError {
    #[error("timestamp {0}s is out of range")]
    Seconds(i64),

    #[error("timestamp {0}ms is out of range")]
    Millis(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct WireRecord {
    pub key: String,
    pub t1: i64,
    pub t2: i64,
    #[serde(default)]
    pub ds: Option<String>,
    pub mt: i64,
    #[serde(default)]
    pub st: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct WireSetting {
    pub key: String,
    pub value: Value,
    pub mt: i64,
    #[serde(default)]
    pub st: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordsEnvelope {
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SettingsEnvelope {
    pub settings: Vec<WireSetting>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdatesEnvelope {
    /// Milliseconds since the epoch.
    pub server_time: f64,
    /// `1` means the delta cannot be trusted.
    pub reset: i64,
    #[serde(default)]
    pub records: Vec<WireRecord>,
    #[serde(default)]
    pub settings: Vec<WireSetting>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WriteEnvelope {
    pub accepted: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<String>,
}

impl From<WriteEnvelope> for WriteResult {
    fn from(envelope: WriteEnvelope) -> Self {
        WriteResult {
            accepted: envelope.accepted,
            rejected: envelope.failed,
            errors: envelope.errors,
        }
    }
}

pub(crate) fn from_seconds(seconds: i64) -> Result<DateTime<Utc>, WireError> {
    DateTime::from_timestamp(seconds, 0).ok_or(WireError::Seconds(seconds))
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, WireError> {
    DateTime::from_timestamp_millis(millis).ok_or(WireError::Millis(millis))
}

/// Server time arrives as fractional seconds; keep millisecond precision.
fn from_fractional_seconds(seconds: f64) -> Result<DateTime<Utc>, WireError> {
    from_millis((seconds * 1000.0) as i64)
}

impl WireRecord {
    pub fn from_record(record: &Record) -> Self {
        WireRecord {
            key: record.key().to_string(),
            t1: record.start().timestamp(),
            t2: record.end().map_or(MAX_TIMESTAMP, |end| end.timestamp()),
            ds: Some(record.description().to_string()),
            mt: record.modified_time().timestamp(),
            st: 0.0,
        }
    }

    pub fn into_record(self) -> Result<Record, WireError> {
        let record = Record::new(self.key, from_seconds(self.t1)?)
            .with_end(from_seconds(self.t2)?)
            .with_description(self.ds.unwrap_or_default())
            .with_modified_time(from_seconds(self.mt)?)
            .with_server_time(from_fractional_seconds(self.st)?);
        Ok(record)
    }
}

impl WireSetting {
    pub fn from_setting(setting: &Setting) -> Self {
        WireSetting {
            key: setting.key().to_string(),
            value: setting.value().clone(),
            mt: setting.modified_time().timestamp(),
            st: 0.0,
        }
    }

    pub fn into_setting(self) -> Result<Setting, WireError> {
        let setting = Setting::new(self.key, self.value)
            .with_modified_time(from_seconds(self.mt)?)
            .with_server_time(from_fractional_seconds(self.st)?);
        Ok(setting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn decodes_record_fields() {
        let wire: WireRecord = serde_json::from_value(json!({
            "key": "r1", "t1": 1_700_000_000, "t2": 1_700_000_240,
            "ds": "#dots test", "mt": 1_700_000_300, "st": 1_700_000_301.25
        }))
        .unwrap();
        let record = wire.into_record().unwrap();
        assert_eq!(record.key(), "r1");
        assert_eq!(record.start(), at(1_700_000_000));
        assert_eq!(record.end(), Some(at(1_700_000_240)));
        assert_eq!(record.description(), "#dots test");
        assert_eq!(record.modified_time(), at(1_700_000_300));
        assert_eq!(record.server_time().timestamp_millis(), 1_700_000_301_250);
        assert_eq!(record.duration_seconds(), 240);
    }

    #[test]
    fn null_or_missing_description_decodes_empty() {
        let null_ds: WireRecord = serde_json::from_value(json!({
            "key": "r1", "t1": 10, "t2": 20, "ds": null, "mt": 30, "st": 0
        }))
        .unwrap();
        assert_eq!(null_ds.into_record().unwrap().description(), "");

        let missing: WireRecord =
            serde_json::from_value(json!({"key": "r2", "t1": 10, "t2": 20, "mt": 30})).unwrap();
        let record = missing.into_record().unwrap();
        assert_eq!(record.description(), "");
        assert_eq!(record.server_time(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn encodes_record_with_zero_server_time() {
        let record = Record::new("r1", at(100))
            .with_end(at(200))
            .with_description("work")
            .with_modified_time(at(300))
            .with_server_time(at(400));
        let wire = serde_json::to_value(WireRecord::from_record(&record)).unwrap();
        assert_eq!(
            wire,
            json!({"key": "r1", "t1": 100, "t2": 200, "ds": "work", "mt": 300, "st": 0.0})
        );
    }

    #[test]
    fn open_ended_record_encodes_far_future_end() {
        let wire = WireRecord::from_record(&Record::new("r1", at(100)));
        assert_eq!(wire.t2, MAX_TIMESTAMP);
        assert_eq!(from_seconds(MAX_TIMESTAMP).unwrap().to_rfc3339(), "9999-12-31T23:59:59+00:00");
    }

    #[test]
    fn record_round_trip_truncates_to_seconds() {
        let start = at(1_700_000_000) + TimeDelta::milliseconds(750);
        let record = Record::new("r1", start)
            .with_end(start + TimeDelta::minutes(4))
            .with_description("HIDDEN old");
        let back = WireRecord::from_record(&record).into_record().unwrap();
        assert_eq!(back.key(), "r1");
        assert_eq!(back.description(), "HIDDEN old");
        assert_eq!(back.start(), at(1_700_000_000));
        assert_eq!(back.end(), Some(at(1_700_000_240)));
        assert_eq!(back.modified_time().timestamp(), record.modified_time().timestamp());
    }

    #[test]
    fn setting_value_passes_through() {
        let value = json!({"nested": [1, 2, {"x": null}]});
        let wire: WireSetting = serde_json::from_value(json!({
            "key": "s1", "value": value, "mt": 50, "st": 60.5
        }))
        .unwrap();
        let setting = wire.into_setting().unwrap();
        assert_eq!(setting.value(), &value);
        assert_eq!(setting.modified_time(), at(50));
        assert_eq!(setting.server_time().timestamp_millis(), 60_500);

        let out = WireSetting::from_setting(&setting);
        assert_eq!(out.value, value);
        assert_eq!(out.mt, 50);
        assert_eq!(out.st, 0.0);
    }

    #[test]
    fn out_of_range_timestamp_is_rejected() {
        let wire = WireRecord {
            key: "r1".into(),
            t1: i64::MAX,
            t2: 0,
            ds: None,
            mt: 0,
            st: 0.0,
        };
        assert_eq!(wire.into_record().unwrap_err(), WireError::Seconds(i64::MAX));
    }

    #[test]
    fn write_envelope_renames_failed_to_rejected() {
        let envelope: WriteEnvelope = serde_json::from_value(json!({
            "accepted": ["a"], "failed": ["b"], "errors": ["b: t2 < t1", "quota"]
        }))
        .unwrap();
        let result = WriteResult::from(envelope);
        assert_eq!(result.rejected, vec!["b"]);
        assert_eq!(result.errors.len(), 2);
    }
}
