//! Clustered time index
//!
//! Index entries (`timestamp → event id`) of every dimension are kept in
//! chained, capacity-bounded clusters registered in a per-dimension
//! directory. Event payloads are stored once as records; clusters and
//! directories only point at them.
//!
//! ```text
//! dir␟<dimension>   <latest>#<cluster> → cluster   ...   ~open → cluster
//! clu␟<cluster>     <ts>#<event-id>    → event-id
//! rec␟<source>␟<id> _source, _timestamp, attributes...
//! ```

mod directory;
mod reader;
mod writer;

use async_trait::async_trait;
use eventstore_core::{
    Event, EventStoreResult, IndexDimension, OrderedStore, QueryError, TimeWindow,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::keys::record_row;
use crate::record::encode_record;
use crate::strategy::RangeIndex;
use writer::ClusterWriter;

/// Sizing of the clustered index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Soft cap on entries per cluster
    pub capacity: usize,
    /// Directory entries fetched per scan when looking for clusters
    pub directory_prefetch: usize,
    /// Dimensions whose write state is kept in memory before idle ones are dropped
    pub cached_dimensions: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            directory_prefetch: 5,
            cached_dimensions: 10_000,
        }
    }
}

impl ClusterConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_directory_prefetch(mut self, prefetch: usize) -> Self {
        self.directory_prefetch = prefetch;
        self
    }

    pub fn with_cached_dimensions(mut self, cached: usize) -> Self {
        self.cached_dimensions = cached;
        self
    }
}

/// Time index built from capacity-bounded, time-disjoint clusters
///
/// The source dimension is always indexed; each configured secondary
/// field adds a dimension for events carrying that attribute.
pub struct ClusteredTimeIndex<S> {
    store: S,
    config: ClusterConfig,
    secondary_fields: Vec<String>,
    writer: ClusterWriter,
}

impl<S: OrderedStore> ClusteredTimeIndex<S> {
    pub fn new(store: S, config: ClusterConfig) -> Self {
        Self {
            store,
            writer: ClusterWriter::new(config.capacity, config.cached_dimensions),
            config,
            secondary_fields: Vec::new(),
        }
    }

    /// Also index events by these attributes
    pub fn with_secondary_fields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.secondary_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn secondary_fields(&self) -> &[String] {
        &self.secondary_fields
    }

    /// The backing store
    pub fn store_ref(&self) -> &S {
        &self.store
    }

    fn supports(&self, dimension: &IndexDimension) -> bool {
        match dimension.secondary_filter() {
            None => true,
            Some((field, _)) => self.secondary_fields.iter().any(|f| f == field),
        }
    }
}

#[async_trait]
impl<S: OrderedStore> RangeIndex for ClusteredTimeIndex<S> {
    fn name(&self) -> &'static str {
        "clustered"
    }

    #[instrument(skip_all, fields(source = %event.source()))]
    async fn store(&self, event: &Event) -> EventStoreResult<()> {
        let store: &dyn OrderedStore = &self.store;
        let id = Uuid::new_v4().to_string();

        // Record first, so no index entry ever points at a missing record
        store
            .put_columns(&record_row(event.source(), &id), &encode_record(event))
            .await?;

        for dimension in IndexDimension::for_event(event, &self.secondary_fields) {
            self.writer
                .append(store, &dimension, event.timestamp(), &id)
                .await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(dimension = %dimension, max = max))]
    async fn find(
        &self,
        dimension: &IndexDimension,
        window: &TimeWindow,
        max: usize,
    ) -> EventStoreResult<Vec<Event>> {
        dimension.validate()?;
        if !self.supports(dimension) {
            return Err(QueryError::Unsupported {
                strategy: self.name(),
                operation: format!("find by {}", dimension.name()),
            }
            .into());
        }
        if max == 0 {
            return Ok(Vec::new());
        }

        let events = reader::find(
            &self.store,
            self.config.directory_prefetch,
            dimension,
            window,
            max,
        )
        .await?;
        debug!(returned = events.len(), "clustered find");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{cluster_row, directory_row, entry_key};
    use chrono::{DateTime, TimeZone, Utc};
    use eventstore_core::{
        ColumnRange, EventStoreError, KEY_SEPARATOR, StorageError, ValidationError,
    };
    use eventstore_storage::InMemoryOrderedStore;
    use std::sync::Arc;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2010, 1, 2, 12, 34, 56).unwrap() + chrono::Duration::seconds(secs)
    }

    fn index(capacity: usize) -> ClusteredTimeIndex<Arc<InMemoryOrderedStore>> {
        ClusteredTimeIndex::new(
            Arc::new(InMemoryOrderedStore::new()),
            ClusterConfig::default()
                .with_capacity(capacity)
                .with_directory_prefetch(2),
        )
        .with_secondary_fields(["LOTNAME"])
    }

    async fn store_at(index: &ClusteredTimeIndex<Arc<InMemoryOrderedStore>>, secs: i64) {
        let event = Event::from_pairs(t(secs), "a", [("n", secs.to_string())]).unwrap();
        index.store(&event).await.unwrap();
    }

    fn seconds(events: &[Event]) -> Vec<i64> {
        events
            .iter()
            .map(|e| (e.timestamp() - t(0)).num_seconds())
            .collect()
    }

    #[tokio::test]
    async fn test_clusters_are_sealed_at_capacity() {
        let index = index(3);
        for secs in 0..10 {
            store_at(&index, secs).await;
        }
        let dir = directory_row(&IndexDimension::source("a"));
        // Three sealed clusters plus the open sentinel
        assert_eq!(index.store_ref().column_count(&dir), 4);

        let all = index
            .find(&IndexDimension::source("a"), &TimeWindow::all(), 100)
            .await
            .unwrap();
        assert_eq!(seconds(&all), (0..10).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_find_stops_at_max() {
        let index = index(2);
        for secs in 0..20 {
            store_at(&index, secs).await;
        }
        let store = index.store_ref();
        store.reset_stats();

        let window = TimeWindow::new(Some(t(3)), None);
        let events = index
            .find(&IndexDimension::source("a"), &window, 3)
            .await
            .unwrap();
        assert_eq!(seconds(&events), vec![3, 4, 5]);
        // Clusters past the third result are never read
        assert!(store.stats().scans < 10);
    }

    #[tokio::test]
    async fn test_late_event_joins_covering_cluster() {
        let index = index(2);
        for secs in [0, 10, 20, 30, 40] {
            store_at(&index, secs).await;
        }
        store_at(&index, 5).await;

        let dir = directory_row(&IndexDimension::source("a"));
        let all = index
            .find(&IndexDimension::source("a"), &TimeWindow::all(), 100)
            .await
            .unwrap();
        assert_eq!(seconds(&all), vec![0, 5, 10, 20, 30, 40]);

        let reversed = index
            .find(
                &IndexDimension::source("a"),
                &TimeWindow::new(Some(t(25)), Some(t(0))),
                3,
            )
            .await
            .unwrap();
        assert_eq!(seconds(&reversed), vec![20, 10, 5]);
        // No extra cluster was opened for the late event
        assert_eq!(index.store_ref().column_count(&dir), 3);
    }

    #[tokio::test]
    async fn test_equal_timestamps_stay_in_open_cluster() {
        let index = index(2);
        for _ in 0..4 {
            store_at(&index, 7).await;
        }
        let dir = directory_row(&IndexDimension::source("a"));
        assert_eq!(index.store_ref().column_count(&dir), 1);

        let window = TimeWindow::new(Some(t(7)), Some(t(7)));
        let events = index
            .find(&IndexDimension::source("a"), &window, 10)
            .await
            .unwrap();
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn test_secondary_dimension() {
        let index = index(2);
        for (secs, lot) in [(0, "L1"), (1, "L2"), (2, "L1"), (3, "L1"), (4, "L1")] {
            let event = Event::from_pairs(t(secs), "a", [("LOTNAME", lot)]).unwrap();
            index.store(&event).await.unwrap();
        }
        let events = index
            .find(
                &IndexDimension::secondary("a", "LOTNAME", "L1"),
                &TimeWindow::all(),
                10,
            )
            .await
            .unwrap();
        assert_eq!(seconds(&events), vec![0, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_unindexed_field_is_unsupported() {
        let index = index(2);
        let err = index
            .find(
                &IndexDimension::secondary("a", "PROCESSID", "P1"),
                &TimeWindow::all(),
                10,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::Query(QueryError::Unsupported { strategy: "clustered", .. })
        ));
    }

    #[tokio::test]
    async fn test_source_cannot_alias_secondary_dimension() {
        let index = index(2);
        let event = Event::from_pairs(t(0), "a", [("LOTNAME", "L1")]).unwrap();
        index.store(&event).await.unwrap();

        let aliasing = format!("a{KEY_SEPARATOR}LOTNAME{KEY_SEPARATOR}L1");
        let err = Event::from_pairs(t(5), aliasing.as_str(), [("n", "x")]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidKey(_)));

        let err = index
            .find(&IndexDimension::source(aliasing.as_str()), &TimeWindow::all(), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::Validation(ValidationError::InvalidKey(_))
        ));

        let lot = index
            .find(
                &IndexDimension::secondary("a", "LOTNAME", "L1"),
                &TimeWindow::all(),
                10,
            )
            .await
            .unwrap();
        assert_eq!(lot, vec![event]);
    }

    #[tokio::test]
    async fn test_idle_dimensions_are_evicted() {
        let index = ClusteredTimeIndex::new(
            Arc::new(InMemoryOrderedStore::new()),
            ClusterConfig::default()
                .with_capacity(2)
                .with_cached_dimensions(3),
        )
        .with_secondary_fields(["LOTNAME"]);

        for secs in 0..12 {
            let lot = format!("L{}", secs % 6);
            let event = Event::from_pairs(t(secs), "a", [("LOTNAME", lot)]).unwrap();
            index.store(&event).await.unwrap();
            assert!(index.writer.cached_dimensions() <= 3);
        }

        // Evicted dimensions resume from their directories
        let all = index
            .find(&IndexDimension::source("a"), &TimeWindow::all(), 100)
            .await
            .unwrap();
        assert_eq!(seconds(&all), (0..12).collect::<Vec<i64>>());
        let dir = directory_row(&IndexDimension::source("a"));
        // Five sealed clusters plus the open sentinel
        assert_eq!(index.store_ref().column_count(&dir), 6);

        let lot = index
            .find(
                &IndexDimension::secondary("a", "LOTNAME", "L4"),
                &TimeWindow::all(),
                10,
            )
            .await
            .unwrap();
        assert_eq!(seconds(&lot), vec![4, 10]);
        let dir = directory_row(&IndexDimension::secondary("a", "LOTNAME", "L4"));
        // One cluster holding both entries, never sealed
        assert_eq!(index.store_ref().column_count(&dir), 1);
    }

    #[tokio::test]
    async fn test_dangling_entry_is_corruption() {
        let index = index(2);
        store_at(&index, 0).await;

        let dir = directory_row(&IndexDimension::source("a"));
        let open = index
            .store_ref()
            .scan(&dir, &ColumnRange::all())
            .await
            .unwrap();
        let cluster = &open[0].1;
        index
            .store_ref()
            .put(&cluster_row(cluster), &entry_key(t(1), "missing"), "missing")
            .await
            .unwrap();

        let err = index
            .find(&IndexDimension::source("a"), &TimeWindow::all(), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EventStoreError::Storage(StorageError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_writer_resumes_from_store() {
        let store = Arc::new(InMemoryOrderedStore::new());
        let config = ClusterConfig::default().with_capacity(2);
        {
            let first = ClusteredTimeIndex::new(Arc::clone(&store), config.clone());
            for secs in 0..3 {
                let event = Event::from_pairs(t(secs), "a", [("n", "x")]).unwrap();
                first.store(&event).await.unwrap();
            }
        }

        let second = ClusteredTimeIndex::new(Arc::clone(&store), config);
        for secs in 3..6 {
            let event = Event::from_pairs(t(secs), "a", [("n", "x")]).unwrap();
            second.store(&event).await.unwrap();
        }
        let dir = directory_row(&IndexDimension::source("a"));
        // Two sealed clusters plus the open sentinel
        assert_eq!(store.column_count(&dir), 3);

        let events = second
            .find(&IndexDimension::source("a"), &TimeWindow::all(), 10)
            .await
            .unwrap();
        assert_eq!(seconds(&events), vec![0, 1, 2, 3, 4, 5]);
    }
}
