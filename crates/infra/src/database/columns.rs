//! Column encodings shared by the repositories

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;

#[derive(Debug, thiserror::Error)]
#[error("timestamp {0}ms is outside the supported range")]
struct TimestampOutOfRange(i64);

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Decode an INTEGER millisecond column read at `index`.
pub(crate) fn from_millis(index: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(TimestampOutOfRange(ms)))
    })
}

/// Decode a JSON TEXT column read at `index`.
pub(crate) fn from_json<T: serde::de::DeserializeOwned>(index: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}
