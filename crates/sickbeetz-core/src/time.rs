//! Timestamp encoding shared by the checkpoint file and playlist entries.
//!
//! The music service reports `added_at` as `YYYY-MM-DDTHH:MM:SSZ`. The
//! checkpoint is written in the same layout so that both values can be
//! compared either as parsed instants or, as a fallback, lexically.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Fixed-width, zero-padded, UTC-only layout (`2023-01-02T15:04:05Z`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {value:?}: {reason}")]
pub struct TimestampError {
    /// The rejected input.
    pub value: String,
    /// Why parsing failed.
    pub reason: String,
}

/// Encodes an instant in the shared timestamp layout.
///
/// Sub-second precision is truncated.
pub fn encode_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp in the shared layout.
///
/// Any RFC 3339 value is accepted as well and normalized to UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TimestampError {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// The checkpoint used before anything has ever been examined.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Returns true if `encoded` is strictly later than `boundary`.
///
/// Parsed instants are compared when `encoded` parses. Otherwise the raw
/// string is compared lexically against the encoded boundary.
pub fn is_after(encoded: &str, boundary: &DateTime<Utc>) -> bool {
    match parse_timestamp(encoded) {
        Ok(instant) => instant > *boundary,
        Err(_) => encoded > encode_timestamp(boundary).as_str(),
    }
}
