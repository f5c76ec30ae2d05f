//! Timestamp helpers for values written to the graph store.

use chrono::{DateTime, Utc};

/// Format a timestamp for storage: ISO 8601, nanosecond precision, UTC.
///
/// Output format: `"2024-01-15T10:30:00.000000000Z"`. Both Cypher `datetime()`
/// and AQL `DATE_ISO8601` accept it, and it sorts lexicographically.
pub fn format_storage_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

/// Current time formatted by [`format_storage_timestamp`].
pub fn storage_now() -> String {
    format_storage_timestamp(&Utc::now())
}
