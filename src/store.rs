//! Shared JSON store: reading model, single-writer append, robust reader.
//!
//! The store file is a pretty-printed JSON list of readings shared between
//! the sampling daemon (sole writer) and any number of consumer processes.
//! The writer rewrites the whole file on every append with no locking and
//! no atomic rename, so a concurrent reader can catch the file truncated or
//! half-written; the retrying reader below is the compensating control for
//! exactly that race.

use crate::hal::ExtendedSample;
use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timestamp layout: ISO-8601 with microsecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Smoothed environmental block of a stored reading, 2 decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environmental {
    pub temperature_celsius: f64,
    pub pressure_millibars: f64,
    pub humidity_percent: f64,
}

/// One timestamped observation. Appended once, never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: String,
    pub environmental: Environmental,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accelerometer: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gyroscope: Option<BTreeMap<String, f64>>,
}

impl Reading {
    /// Build a reading from smoothed metric values, rounding the
    /// environmental block to 2 decimals. IMU channels ride along only when
    /// the acquisition source supplied them.
    pub fn new(
        at: DateTime<Local>,
        temperature: f64,
        humidity: f64,
        pressure: f64,
        extended: Option<ExtendedSample>,
    ) -> Self {
        let (orientation, magnetometer, accelerometer, gyroscope) = match extended {
            Some(ext) => (
                Some(ext.orientation),
                Some(ext.magnetometer),
                Some(ext.accelerometer),
                Some(ext.gyroscope),
            ),
            None => (None, None, None, None),
        };
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            environmental: Environmental {
                temperature_celsius: round2(temperature),
                pressure_millibars: round2(pressure),
                humidity_percent: round2(humidity),
            },
            orientation,
            magnetometer,
            accelerometer,
            gyroscope,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Persistence seam for the pipeline. The shipped implementation grows the
/// file without bound; a rotating store can be slotted in here without
/// touching the sampling loop.
pub trait ReadingStore: Send + Sync {
    fn append(&self, reading: &Reading) -> Result<()>;
    fn read_all(&self) -> Result<Vec<Value>>;
}

/// Whole-file-rewrite JSON store. Single writer assumed.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadingStore for JsonFileStore {
    /// Read-modify-append-rewrite. A missing or unparsable file means
    /// "start fresh", never an error; only a failing write is fatal.
    fn append(&self, reading: &Reading) -> Result<()> {
        let mut records: Vec<Value> = match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read store file {}: {}",
                    self.path.display(),
                    e
                ))
            }
        };

        records.push(serde_json::to_value(reading)?);

        let text = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, text).map_err(|e| {
            anyhow::anyhow!("Failed to write store file {}: {}", self.path.display(), e)
        })?;
        tracing::debug!("Appended reading #{} to {}", records.len(), self.path.display());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Value>> {
        match try_read_store(&self.path) {
            ReadAttempt::Empty => Ok(Vec::new()),
            ReadAttempt::Ready(records) => Ok(records),
            ReadAttempt::Corrupt(reason) => Err(anyhow::anyhow!(
                "Store file {} is unreadable: {}",
                self.path.display(),
                reason
            )),
        }
    }
}

/// Outcome of one reader attempt against the store file.
#[derive(Debug)]
pub enum ReadAttempt {
    /// File absent or zero-length: there is simply no data yet.
    Empty,
    /// Parsed a top-level list.
    Ready(Vec<Value>),
    /// Unreadable, unparsable, or wrong top-level shape.
    Corrupt(String),
}

/// Classify the store file as it exists right now.
pub fn try_read_store(path: &Path) -> ReadAttempt {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return ReadAttempt::Empty,
        Err(e) => return ReadAttempt::Corrupt(e.to_string()),
    };
    if meta.len() == 0 {
        return ReadAttempt::Empty;
    }

    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => return ReadAttempt::Corrupt(e.to_string()),
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(records)) => ReadAttempt::Ready(records),
        Ok(other) => ReadAttempt::Corrupt(format!("top-level {} is not a list", json_type(&other))),
        Err(e) => ReadAttempt::Corrupt(e.to_string()),
    }
}

/// Reader used by every process that is not the writer.
///
/// A missing or empty file is "no data yet" and returns immediately.
/// Anything unparsable is assumed to be the writer mid-rewrite: wait and
/// try again, up to `max_retries` attempts, then give up with an empty
/// result. Never returns an error to the caller.
pub fn read_with_retry(path: &Path, max_retries: u32, delay: Duration) -> Vec<Value> {
    for attempt in 1..=max_retries {
        match try_read_store(path) {
            ReadAttempt::Empty => return Vec::new(),
            ReadAttempt::Ready(records) => return records,
            ReadAttempt::Corrupt(reason) => {
                tracing::warn!(
                    "Store read attempt {}/{} failed: {}",
                    attempt,
                    max_retries,
                    reason
                );
                if attempt < max_retries {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Vec::new()
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::new(dir.path().join("sensor_data.json"))
    }

    #[test]
    fn round_trip_single_reading() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let reading = Reading::new(Local::now(), 21.567, 44.444, 1013.333, None);
        store.append(&reading).unwrap();

        let records = store.read_all().unwrap();
        assert_eq!(records.len(), 1);
        let env = &records[0]["environmental"];
        assert_eq!(env["temperature_celsius"], 21.57);
        assert_eq!(env["humidity_percent"], 44.44);
        assert_eq!(env["pressure_millibars"], 1013.33);
        assert_eq!(records[0]["timestamp"].as_str().unwrap(), reading.timestamp);
        // No IMU supplied, so no IMU keys stored.
        assert!(records[0].get("orientation").is_none());
    }

    #[test]
    fn reading_back_twice_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&Reading::new(Local::now(), 20.0, 40.0, 1000.0, None)).unwrap();
        store.append(&Reading::new(Local::now(), 21.0, 41.0, 1001.0, None)).unwrap();

        let first = store.read_all().unwrap();
        let second = store.read_all().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn append_starts_fresh_over_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "not json at all").unwrap();

        store.append(&Reading::new(Local::now(), 19.0, 50.0, 995.0, None)).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn append_fails_when_parent_directory_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("no_such_dir").join("data.json"));
        let err = store.append(&Reading::new(Local::now(), 1.0, 2.0, 3.0, None));
        assert!(err.is_err());
    }

    #[test]
    fn reader_returns_empty_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(read_with_retry(&path, 3, Duration::ZERO).is_empty());
    }

    #[test]
    fn reader_returns_empty_for_zero_length_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "").unwrap();
        assert!(read_with_retry(&path, 3, Duration::ZERO).is_empty());
    }

    #[test]
    fn reader_gives_up_on_truncated_content() {
        // The shape a reader sees when it races the writer mid-rewrite.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.json");
        fs::write(&path, r#"[{"timestamp": "2025-09-16T21:05:12.4541"#).unwrap();
        assert!(read_with_retry(&path, 3, Duration::ZERO).is_empty());
    }

    #[test]
    fn reader_treats_non_list_top_level_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("object.json");
        fs::write(&path, r#"{"timestamp": "x"}"#).unwrap();
        assert!(read_with_retry(&path, 2, Duration::ZERO).is_empty());
        assert!(matches!(try_read_store(&path), ReadAttempt::Corrupt(_)));
    }

    #[test]
    fn extended_channels_are_stored_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut ext = ExtendedSample::default();
        ext.orientation.insert("yaw_degrees".into(), 123.45);
        store.append(&Reading::new(Local::now(), 20.0, 40.0, 1000.0, Some(ext))).unwrap();

        let records = store.read_all().unwrap();
        assert_eq!(records[0]["orientation"]["yaw_degrees"], 123.45);
    }
}
