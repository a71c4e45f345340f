//! Cluster bookkeeping on the write path
//!
//! Every dimension has one open cluster. Appends go to it until it holds
//! `capacity` entries and a strictly later event arrives; it is then sealed
//! under its latest timestamp and a fresh cluster is opened. An event at or
//! before the latest sealed timestamp is appended to the sealed cluster that
//! covers it, so clusters stay time-disjoint even for late arrivals.
//!
//! The check-then-open decision runs under a per-dimension async mutex.
//! Several processes writing the same dimension are not coordinated.
//!
//! Sequencers are cached per dimension. Once more than `max_cached` are
//! held, the ones no task is using are dropped; their state is rebuilt from
//! the directory on the next append.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use eventstore_core::{ColumnRange, IndexDimension, OrderedStore, StorageError};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::directory::{DirectoryEntry, sealed_column};
use crate::keys::{
    OPEN_SENTINEL, cluster_row, directory_row, encode_timestamp, entry_key, timestamp_part,
};

/// Write-side view of a dimension's open cluster
#[derive(Debug, Default)]
struct OpenCluster {
    loaded: bool,
    id: Option<String>,
    len: usize,
    /// Encoded timestamp of the newest entry
    latest: Option<String>,
    /// Encoded latest timestamp of the newest sealed cluster
    sealed_latest: Option<String>,
}

pub(crate) struct ClusterWriter {
    capacity: usize,
    max_cached: usize,
    sequencers: DashMap<String, Arc<Mutex<OpenCluster>>>,
}

impl ClusterWriter {
    pub(crate) fn new(capacity: usize, max_cached: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            max_cached: max_cached.max(1),
            sequencers: DashMap::new(),
        }
    }

    /// Number of dimensions whose sequencer is currently cached
    pub(crate) fn cached_dimensions(&self) -> usize {
        self.sequencers.len()
    }

    /// Drop sequencers held by no task once the cache is over its bound
    fn evict_idle(&self) {
        let before = self.sequencers.len();
        if before <= self.max_cached {
            return;
        }
        // The map's own reference is the only one left on an idle sequencer
        self.sequencers
            .retain(|_, sequencer| Arc::strong_count(sequencer) > 1);
        debug!(
            before,
            after = self.sequencers.len(),
            "evicted idle dimension sequencers"
        );
    }

    fn sequencer(&self, dir_row: &str) -> Arc<Mutex<OpenCluster>> {
        self.sequencers
            .entry(dir_row.to_string())
            .or_default()
            .clone()
    }

    /// Append an index entry for `event_id` at `ts` to the dimension
    pub(crate) async fn append(
        &self,
        store: &dyn OrderedStore,
        dimension: &IndexDimension,
        ts: DateTime<Utc>,
        event_id: &str,
    ) -> Result<(), StorageError> {
        let dir_row = directory_row(dimension);
        let sequencer = self.sequencer(&dir_row);
        let result = {
            let mut open = sequencer.lock().await;
            let result = self
                .append_locked(store, dimension, &dir_row, &mut open, ts, event_id)
                .await;
            if result.is_err() {
                // Reload from the store next time rather than trust partial state
                open.loaded = false;
            }
            result
        };
        drop(sequencer);

        self.evict_idle();
        result
    }

    async fn append_locked(
        &self,
        store: &dyn OrderedStore,
        dimension: &IndexDimension,
        dir_row: &str,
        open: &mut OpenCluster,
        ts: DateTime<Utc>,
        event_id: &str,
    ) -> Result<(), StorageError> {
        if !open.loaded {
            *open = load(store, dir_row).await?;
            debug!(%dimension, cluster = ?open.id, len = open.len, "loaded open cluster");
        }

        let ts_key = encode_timestamp(ts);
        let entry = entry_key(ts, event_id);

        if open
            .sealed_latest
            .as_ref()
            .is_some_and(|sealed| ts_key <= *sealed)
        {
            return append_late(store, dimension, dir_row, &ts_key, &entry, event_id).await;
        }

        let cluster_id = match open.id.clone() {
            None => open_cluster(store, dimension, dir_row, open).await?,
            Some(id)
                if open.len >= self.capacity
                    && open.latest.as_ref().is_some_and(|latest| ts_key > *latest) =>
            {
                seal(store, dimension, dir_row, open, &id).await?;
                open_cluster(store, dimension, dir_row, open).await?
            }
            Some(id) => {
                if open.len >= self.capacity {
                    trace!(%dimension, cluster = %id, len = open.len, "over capacity at shared instant");
                }
                id
            }
        };

        store.put(&cluster_row(&cluster_id), &entry, event_id).await?;
        open.len += 1;
        if open.latest.as_ref().is_none_or(|latest| ts_key > *latest) {
            open.latest = Some(ts_key);
        }
        Ok(())
    }
}

/// Rebuild the write-side state of a dimension from its directory
async fn load(store: &dyn OrderedStore, dir_row: &str) -> Result<OpenCluster, StorageError> {
    let mut state = OpenCluster {
        loaded: true,
        ..Default::default()
    };

    // The sentinel sorts last, the newest sealed cluster just before it
    let top = store
        .scan(dir_row, &ColumnRange::all().reversed().limit(2))
        .await?;
    let mut newest_sealed = None;
    for column in top {
        match DirectoryEntry::parse(dir_row, column)? {
            DirectoryEntry::Open { cluster_id } => state.id = Some(cluster_id),
            DirectoryEntry::Sealed { latest, cluster_id } => {
                if newest_sealed.is_none() {
                    state.sealed_latest = Some(latest);
                    newest_sealed = Some(cluster_id);
                }
            }
        }
    }

    // A seal interrupted before the sentinel moved leaves it on a sealed cluster
    if state.id.is_some() && state.id == newest_sealed {
        state.id = None;
    }

    if let Some(id) = &state.id {
        let entries = store.scan(&cluster_row(id), &ColumnRange::all()).await?;
        state.len = entries.len();
        state.latest = entries
            .last()
            .map(|(column, _)| timestamp_part(column).to_string());
    }
    Ok(state)
}

async fn open_cluster(
    store: &dyn OrderedStore,
    dimension: &IndexDimension,
    dir_row: &str,
    open: &mut OpenCluster,
) -> Result<String, StorageError> {
    let id = Uuid::new_v4().to_string();
    store.put(dir_row, OPEN_SENTINEL, &id).await?;
    info!(%dimension, cluster = %id, "opened cluster");

    open.id = Some(id.clone());
    open.len = 0;
    open.latest = None;
    Ok(id)
}

async fn seal(
    store: &dyn OrderedStore,
    dimension: &IndexDimension,
    dir_row: &str,
    open: &mut OpenCluster,
    cluster_id: &str,
) -> Result<(), StorageError> {
    let Some(latest) = open.latest.clone() else {
        return Err(StorageError::corrupted(
            cluster_row(cluster_id),
            "cannot seal an empty cluster",
        ));
    };
    store
        .put(dir_row, &sealed_column(&latest, cluster_id), cluster_id)
        .await?;
    info!(
        %dimension,
        cluster = %cluster_id,
        len = open.len,
        latest = %latest,
        "sealed cluster"
    );

    open.sealed_latest = Some(latest);
    open.id = None;
    Ok(())
}

/// Route an event at or before the newest sealed timestamp to its covering cluster
async fn append_late(
    store: &dyn OrderedStore,
    dimension: &IndexDimension,
    dir_row: &str,
    ts_key: &str,
    entry: &str,
    event_id: &str,
) -> Result<(), StorageError> {
    let covering = store
        .scan(
            dir_row,
            &ColumnRange::new(Some(ts_key.to_string()), None).limit(1),
        )
        .await?;
    let Some(column) = covering.into_iter().next() else {
        return Err(StorageError::corrupted(
            dir_row,
            format!("no cluster covers {ts_key}"),
        ));
    };

    let directory_entry = DirectoryEntry::parse(dir_row, column)?;
    if let DirectoryEntry::Sealed { cluster_id, .. } = &directory_entry {
        warn!(
            %dimension,
            cluster = %cluster_id,
            ts = %ts_key,
            "late event appended to sealed cluster beyond capacity"
        );
    }
    store
        .put(&cluster_row(directory_entry.cluster_id()), entry, event_id)
        .await
}
