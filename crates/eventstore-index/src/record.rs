//! Event record codec
//!
//! A record is the full event flattened into the columns of one row: the
//! reserved `_source` and `_timestamp` columns plus one column per
//! attribute. Attribute keys can never start with `_`, so the two sets
//! cannot collide.

use eventstore_core::{Attributes, Column, Event, SOURCE_KEY, StorageError, TIMESTAMP_KEY};

use crate::keys::{decode_timestamp, encode_timestamp};

/// Columns holding a full event
pub fn encode_record(event: &Event) -> Vec<Column> {
    let mut columns = Vec::with_capacity(event.attributes().len() + 2);
    columns.push((SOURCE_KEY.to_string(), event.source().to_string()));
    columns.push((
        TIMESTAMP_KEY.to_string(),
        encode_timestamp(event.timestamp()),
    ));
    columns.extend(
        event
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    columns
}

/// Rebuild an event from the columns of `row`
pub fn decode_record(
    row: &str,
    columns: impl IntoIterator<Item = Column>,
) -> Result<Event, StorageError> {
    let mut source = None;
    let mut timestamp = None;
    let mut attributes = Attributes::new();

    for (key, value) in columns {
        match key.as_str() {
            SOURCE_KEY => source = Some(value),
            TIMESTAMP_KEY => timestamp = Some(decode_timestamp(&value)?),
            _ => {
                attributes.insert(key, value);
            }
        }
    }

    let source = source.ok_or_else(|| StorageError::corrupted(row, "missing source column"))?;
    let timestamp =
        timestamp.ok_or_else(|| StorageError::corrupted(row, "missing timestamp column"))?;

    Event::new(timestamp, source, attributes)
        .map_err(|e| StorageError::corrupted(row, e.to_string()))
}
