//! Row and column key encoding
//!
//! Timestamps are written as fixed-width UTC text so that lexical order
//! of column keys equals chronological order. Index entries combine the
//! timestamp with the event id (`<ts>#<id>`), which keeps them unique
//! for events sharing an instant.

use chrono::{DateTime, SecondsFormat, Utc};
use eventstore_core::{IndexDimension, KEY_SEPARATOR, StorageError};

/// Separates the timestamp from the id in an index entry key
pub const ENTRY_SEPARATOR: char = '#';

/// Sorts after every id that can follow [`ENTRY_SEPARATOR`]
const ENTRY_END: char = '~';

/// Directory column of the cluster currently accepting entries
pub const OPEN_SENTINEL: &str = "~open";

const DIRECTORY_PREFIX: &str = "dir";
const CLUSTER_PREFIX: &str = "clu";
const RECORD_PREFIX: &str = "rec";
const FLAT_PREFIX: &str = "flat";

/// Fixed-width, lexically sortable rendering of an instant
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Deserialization(format!("timestamp {text:?}: {e}")))
}

/// Column key of an index entry
pub fn entry_key(ts: DateTime<Utc>, id: &str) -> String {
    format!("{}{ENTRY_SEPARATOR}{id}", encode_timestamp(ts))
}

/// Timestamp part of an index entry or sealed directory column
pub fn timestamp_part(column: &str) -> &str {
    column
        .split_once(ENTRY_SEPARATOR)
        .map_or(column, |(ts, _)| ts)
}

/// Inclusive lower column bound covering every entry at `ts`
pub fn lower_bound(ts: DateTime<Utc>) -> String {
    encode_timestamp(ts)
}

/// Inclusive upper column bound covering every entry at `ts`
pub fn upper_bound(ts: DateTime<Utc>) -> String {
    format!("{}{ENTRY_SEPARATOR}{ENTRY_END}", encode_timestamp(ts))
}

pub fn directory_row(dimension: &IndexDimension) -> String {
    format!("{DIRECTORY_PREFIX}{KEY_SEPARATOR}{}", dimension.key())
}

pub fn cluster_row(cluster_id: &str) -> String {
    format!("{CLUSTER_PREFIX}{KEY_SEPARATOR}{cluster_id}")
}

pub fn record_row(source: &str, id: &str) -> String {
    format!("{RECORD_PREFIX}{KEY_SEPARATOR}{source}{KEY_SEPARATOR}{id}")
}

pub fn flat_row(id: &str) -> String {
    format!("{}{id}", flat_prefix())
}

/// Prefix shared by every flat index row
pub fn flat_prefix() -> String {
    format!("{FLAT_PREFIX}{KEY_SEPARATOR}")
}
