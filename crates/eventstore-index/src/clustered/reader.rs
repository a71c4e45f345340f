//! Range queries over the cluster directory
//!
//! Clusters are time-disjoint and the directory lists them in time order,
//! so visiting them in directory order and concatenating their entries
//! yields a globally ordered result without a merge step.

use std::collections::HashSet;

use eventstore_core::{
    ColumnRange, Direction, Event, IndexDimension, OrderedStore, StorageError, TimeWindow,
};
use futures::future::try_join_all;
use tracing::trace;

use super::directory::{DirectoryEntry, DirectoryPager};
use crate::keys::{
    cluster_row, directory_row, encode_timestamp, lower_bound, record_row, upper_bound,
};
use crate::record::decode_record;

pub(crate) async fn find(
    store: &dyn OrderedStore,
    prefetch: usize,
    dimension: &IndexDimension,
    window: &TimeWindow,
    max: usize,
) -> Result<Vec<Event>, StorageError> {
    let direction = window.direction();
    let dir_row = directory_row(dimension);
    let dir_lower = window.lower().map(lower_bound);

    let dir_range = match direction {
        Direction::Ascending => ColumnRange::new(dir_lower, None),
        Direction::Descending => {
            // Start from the cluster holding the upper bound
            let start = match window.upper() {
                Some(hi) => {
                    let first = store
                        .scan(
                            &dir_row,
                            &ColumnRange::new(Some(lower_bound(hi)), None).limit(1),
                        )
                        .await?;
                    match first.into_iter().next() {
                        Some((column, _)) => Some(column),
                        None => return Ok(Vec::new()),
                    }
                }
                None => None,
            };
            ColumnRange::new(dir_lower, start).reversed()
        }
    };

    let entry_range = ColumnRange::new(
        window.lower().map(lower_bound),
        window.upper().map(upper_bound),
    )
    .direction(direction);
    let stop_at = window.upper().map(encode_timestamp);

    let mut pager = DirectoryPager::new(dir_row, dir_range, prefetch);
    let mut visited = HashSet::new();
    let mut events = Vec::new();

    while let Some(page) = pager.next_page(store).await? {
        for column in page {
            let entry = DirectoryEntry::parse(pager.row(), column)?;

            if visited.insert(entry.cluster_id().to_string()) {
                let range = entry_range.clone().limit(max - events.len());
                let found = read_cluster(store, dimension, entry.cluster_id(), &range).await?;
                events.extend(found);
                if events.len() >= max {
                    return Ok(events);
                }
            }

            if direction == Direction::Ascending {
                let last = match &entry {
                    DirectoryEntry::Open { .. } => true,
                    DirectoryEntry::Sealed { latest, .. } => {
                        stop_at.as_ref().is_some_and(|hi| latest >= hi)
                    }
                };
                if last {
                    return Ok(events);
                }
            }
        }
    }
    Ok(events)
}

/// Entries of one cluster within `range`, resolved to their records
async fn read_cluster(
    store: &dyn OrderedStore,
    dimension: &IndexDimension,
    cluster_id: &str,
    range: &ColumnRange,
) -> Result<Vec<Event>, StorageError> {
    let entries = store.scan(&cluster_row(cluster_id), range).await?;
    trace!(%dimension, cluster = %cluster_id, entries = entries.len(), "read cluster");

    let source = dimension.source_name();
    try_join_all(
        entries
            .iter()
            .map(|(column, event_id)| load_record(store, source, column, event_id)),
    )
    .await
}

async fn load_record(
    store: &dyn OrderedStore,
    source: &str,
    entry: &str,
    event_id: &str,
) -> Result<Event, StorageError> {
    let row = record_row(source, event_id);
    let columns = store.scan(&row, &ColumnRange::all()).await?;
    if columns.is_empty() {
        return Err(StorageError::corrupted(
            row,
            format!("dangling index entry {entry}"),
        ));
    }
    decode_record(&row, columns)
}
