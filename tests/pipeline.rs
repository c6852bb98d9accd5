//! End-to-end pipeline test: sampler -> store file -> robust reader ->
//! series extractor, over a real temp directory.

use chrono::Local;
use sensehat_station::config::StationConfig;
use sensehat_station::sampler::{EnvironmentalSample, Sampler};
use sensehat_station::series;
use sensehat_station::store::{read_with_retry, JsonFileStore, Reading, ReadingStore};
use serde_json::json;
use std::time::Duration;

#[test]
fn smoothed_samples_round_trip_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_data.json");
    let store = JsonFileStore::new(path.clone());

    let cfg = StationConfig::default();
    let mut sampler = Sampler::new(&cfg.sampling);

    // Three synthetic temperature readings against the default window of
    // 10: each flush stores the running mean of everything so far.
    for raw in [20.0, 21.0, 22.0] {
        let smoothed = sampler.ingest(EnvironmentalSample {
            temperature: raw,
            humidity: 40.0,
            pressure: 1000.0,
        });
        let reading = Reading::new(
            Local::now(),
            smoothed.temperature,
            smoothed.humidity,
            smoothed.pressure,
            None,
        );
        store.append(&reading).unwrap();
    }

    let records = read_with_retry(&path, 3, Duration::ZERO);
    assert_eq!(records.len(), 3);

    let temps = series::extract("temperature_celsius", &records);
    assert_eq!(temps, vec![json!(20.0), json!(20.5), json!(21.0)]);

    // Timestamps came out in append order.
    let timestamps = series::extract("timestamp", &records);
    let as_strings: Vec<&str> = timestamps.iter().filter_map(|v| v.as_str()).collect();
    assert_eq!(as_strings.len(), 3);
    let mut sorted = as_strings.clone();
    sorted.sort();
    assert_eq!(as_strings, sorted);
}

#[test]
fn consumer_never_errors_while_the_writer_owns_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_data.json");

    // Before the writer has ever flushed: no data, not an error.
    assert!(read_with_retry(&path, 3, Duration::ZERO).is_empty());

    // A half-written rewrite, as a racing reader would see it.
    std::fs::write(&path, "[\n  {\n    \"timestamp\": \"2025-").unwrap();
    assert!(read_with_retry(&path, 3, Duration::ZERO).is_empty());

    // Writer finishes; the same reader call now sees the data.
    let store = JsonFileStore::new(path.clone());
    store.append(&Reading::new(Local::now(), 20.0, 40.0, 1000.0, None)).unwrap();
    assert_eq!(read_with_retry(&path, 3, Duration::ZERO).len(), 1);
}
