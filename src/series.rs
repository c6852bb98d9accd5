//! Time-series extraction over stored records.
//!
//! Flattens the list-of-objects store into per-key chronological value
//! sequences for the chart-rendering consumer.

use chrono::{Duration, NaiveDateTime};
use serde_json::Value;

use crate::store::TIMESTAMP_FORMAT;

/// Collect `key` from every record, in record order.
///
/// A record contributes its top-level `key` field, then the `key` field of
/// every nested object value. A key appearing in several nested objects of
/// one record contributes every match; duplicates are kept on purpose, so
/// positions stay aligned with a parallel timestamp series.
pub fn extract(key: &str, records: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for record in records {
        let Value::Object(fields) = record else { continue };
        if let Some(v) = fields.get(key) {
            out.push(v.clone());
        }
        for nested in fields.values() {
            if let Value::Object(inner) = nested {
                if let Some(v) = inner.get(key) {
                    out.push(v.clone());
                }
            }
        }
    }
    out
}

/// `extract`, restricted to entries whose timestamp falls within the last
/// `days` days of `now`.
///
/// The timestamp series is filtered first; the value series is then
/// tail-sliced by the same count, so the two stay index-aligned. Both tails
/// are returned together.
pub fn extract_last_days_at(
    key: &str,
    records: &[Value],
    days: i64,
    now: NaiveDateTime,
) -> (Vec<String>, Vec<Value>) {
    let timestamps: Vec<String> = extract("timestamp", records)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_owned))
        .collect();
    let values = extract(key, records);

    let cutoff = now - Duration::days(days);
    let recent = timestamps
        .iter()
        .filter(|ts| {
            NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
                .map(|t| t >= cutoff)
                .unwrap_or(false)
        })
        .count();

    let ts_tail = timestamps[timestamps.len().saturating_sub(recent)..].to_vec();
    let val_tail = values[values.len().saturating_sub(recent)..].to_vec();
    (ts_tail, val_tail)
}

/// Day-range extraction against the wall clock.
pub fn extract_last_days(key: &str, records: &[Value], days: i64) -> (Vec<String>, Vec<Value>) {
    extract_last_days_at(key, records, days, chrono::Local::now().naive_local())
}
