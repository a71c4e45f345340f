//! Flat range index
//!
//! One row per event under a random key, with the source, timestamp and
//! attributes as columns. A query fetches every row of the dimension that
//! falls inside the window, then sorts and truncates in memory. Cost grows
//! with the number of rows in the window regardless of `max`.

use async_trait::async_trait;
use eventstore_core::{
    Event, EventStoreResult, IndexDimension, OrderedStore, RowQuery, SOURCE_KEY, TIMESTAMP_KEY,
    TimeWindow,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::keys::{encode_timestamp, flat_prefix, flat_row, lower_bound};
use crate::record::{decode_record, encode_record};
use crate::strategy::RangeIndex;

/// Equality-filter + in-memory sort strategy
pub struct FlatRangeIndex<S> {
    store: S,
}

impl<S: OrderedStore> FlatRangeIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store
    pub fn store_ref(&self) -> &S {
        &self.store
    }

    fn query_for(dimension: &IndexDimension, window: &TimeWindow) -> RowQuery {
        let mut equals = vec![(SOURCE_KEY.to_string(), dimension.source_name().to_string())];
        if let Some((field, value)) = dimension.secondary_filter() {
            equals.push((field.to_string(), value.to_string()));
        }
        RowQuery {
            row_prefix: flat_prefix(),
            equals,
            range_column: TIMESTAMP_KEY.to_string(),
            lower: window.lower().map(lower_bound),
            upper: window.upper().map(encode_timestamp),
        }
    }
}

#[async_trait]
impl<S: OrderedStore> RangeIndex for FlatRangeIndex<S> {
    fn name(&self) -> &'static str {
        "flat"
    }

    #[instrument(skip_all, fields(source = %event.source()))]
    async fn store(&self, event: &Event) -> EventStoreResult<()> {
        let row = flat_row(&Uuid::new_v4().to_string());
        self.store
            .put_columns(&row, &encode_record(event))
            .await?;
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
        let rows = self
            .store
            .query_rows(&Self::query_for(dimension, window))
            .await?;
        let fetched = rows.len();

        let mut events = rows
            .into_iter()
            .map(|row| -> EventStoreResult<(Event, String)> {
                let event = decode_record(&row.key, row.columns)?;
                Ok((event, row.key))
            })
            .collect::<EventStoreResult<Vec<_>>>()?;

        // Row keys are the generated ids, so ties on equal instants are stable
        events.sort_by(|(a, a_key), (b, b_key)| {
            a.timestamp()
                .cmp(&b.timestamp())
                .then_with(|| a_key.cmp(b_key))
        });
        if window.direction().is_reverse() {
            events.reverse();
        }
        events.truncate(max);

        debug!(fetched, returned = events.len(), "flat find");
        Ok(events.into_iter().map(|(event, _)| event).collect())
    }
}
