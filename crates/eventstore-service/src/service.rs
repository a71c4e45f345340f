//! Query facade
//!
//! Normalizes time inputs, applies the default limit, validates requests
//! and dispatches to the configured [`RangeIndex`].

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use eventstore_core::{
    Attributes, Clock, Event, EventStoreResult, IndexDimension, OrderedStore, SystemClock,
    TimeInput, TimeWindow, ValidationError, check_key_part,
};
use eventstore_index::{
    ClusteredTimeIndex, FlatRangeIndex, IndexStrategyKind, RangeIndex, find_many,
};
use eventstore_storage::{InMemoryOrderedStore, RedbOrderedStore};
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, ServiceConfig, StorageConfig};

/// Public store/find contract of the event store
///
/// Reverse order is requested by passing a `from` chronologically after
/// `till`: the result then counts backward from `from`.
pub struct EventService<C: Clock = SystemClock> {
    index: Arc<dyn RangeIndex>,
    clock: C,
    config: ServiceConfig,
}

impl EventService<SystemClock> {
    /// Open the configured backend and index with the system clock
    pub fn open(config: ServiceConfig) -> Result<Self, ConfigError> {
        Self::open_with_clock(config, SystemClock)
    }
}

impl<C: Clock> EventService<C> {
    /// Open the configured backend and index
    #[instrument(skip_all, fields(strategy = %config.strategy))]
    pub fn open_with_clock(config: ServiceConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        let store: Arc<dyn OrderedStore> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryOrderedStore::new()),
            StorageConfig::Redb(redb) => Arc::new(RedbOrderedStore::open(redb.clone())?),
        };
        info!(storage = ?config.storage, "opened event service");
        Ok(Self::with_store(store, clock, config))
    }

    /// Build the configured index strategy over an existing store
    pub fn with_store(store: Arc<dyn OrderedStore>, clock: C, config: ServiceConfig) -> Self {
        let index: Arc<dyn RangeIndex> = match config.strategy {
            IndexStrategyKind::Flat => Arc::new(FlatRangeIndex::new(store)),
            IndexStrategyKind::Clustered => Arc::new(
                ClusteredTimeIndex::new(store, config.cluster.clone())
                    .with_secondary_fields(config.dimensions.secondary_fields()),
            ),
        };
        Self::new(index, clock, config)
    }

    /// Serve queries from an already built index
    pub fn new(index: Arc<dyn RangeIndex>, clock: C, config: ServiceConfig) -> Self {
        Self {
            index,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Name of the active index strategy
    pub fn strategy(&self) -> &'static str {
        self.index.name()
    }

    /// Store a fully built event
    #[instrument(skip_all, fields(source = %event.source(), strategy = self.strategy()))]
    pub async fn store_event(&self, event: Event) -> EventStoreResult<()> {
        check_source(event.source())?;
        check_instant(event.timestamp())?;
        self.index.store(&event).await?;
        debug!("stored event");
        Ok(())
    }

    /// Store an event at an instant, calendar date (midnight UTC) or ISO-8601 text
    pub async fn store_at(
        &self,
        at: impl Into<TimeInput>,
        source: &str,
        attributes: Attributes,
    ) -> EventStoreResult<Event> {
        let at: TimeInput = at.into();
        let timestamp = at.to_instant()?;
        let event = Event::new(timestamp, source, attributes)?;
        self.store_event(event.clone()).await?;
        Ok(event)
    }

    /// Store an event stamped with the current time of the service clock
    pub async fn store_now(
        &self,
        source: &str,
        attributes: Attributes,
    ) -> EventStoreResult<Event> {
        self.store_at(self.clock.now(), source, attributes).await
    }

    /// Events of one source within `[from, till]`
    #[instrument(skip_all, fields(source = %source, strategy = self.strategy()))]
    pub async fn find(
        &self,
        source: &str,
        from: Option<TimeInput>,
        till: Option<TimeInput>,
        limit: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        check_source(source)?;
        self.find_in(IndexDimension::source(source), from, till, limit)
            .await
    }

    /// Events of several sources, merged into one ordered sequence
    #[instrument(skip_all, fields(sources = sources.len(), strategy = self.strategy()))]
    pub async fn find_many(
        &self,
        sources: &[String],
        from: Option<TimeInput>,
        till: Option<TimeInput>,
        limit: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        for source in sources {
            check_source(source)?;
        }
        let window = window(from, till)?;
        let max = self.limit(limit)?;
        let events = find_many(self.index.as_ref(), sources, &window, max).await?;
        debug!(returned = events.len(), "find many");
        Ok(events)
    }

    /// Events of one source carrying the given lot
    #[instrument(skip_all, fields(source = %source, lot = %lot))]
    pub async fn find_by_lot(
        &self,
        lot: &str,
        source: &str,
        from: Option<TimeInput>,
        till: Option<TimeInput>,
        limit: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        check_source(source)?;
        let dimension =
            IndexDimension::secondary(source, self.config.dimensions.lot_attribute.as_str(), lot);
        self.find_in(dimension, from, till, limit).await
    }

    /// Events of one source carrying the given process id
    #[instrument(skip_all, fields(source = %source, process = %process_id))]
    pub async fn find_by_process(
        &self,
        process_id: &str,
        source: &str,
        from: Option<TimeInput>,
        till: Option<TimeInput>,
        limit: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        check_source(source)?;
        let dimension = IndexDimension::secondary(
            source,
            self.config.dimensions.process_attribute.as_str(),
            process_id,
        );
        self.find_in(dimension, from, till, limit).await
    }

    async fn find_in(
        &self,
        dimension: IndexDimension,
        from: Option<TimeInput>,
        till: Option<TimeInput>,
        limit: Option<usize>,
    ) -> EventStoreResult<Vec<Event>> {
        let window = window(from, till)?;
        let max = self.limit(limit)?;
        let events = self.index.find(&dimension, &window, max).await?;
        debug!(%dimension, returned = events.len(), "find");
        Ok(events)
    }

    fn limit(&self, limit: Option<usize>) -> Result<usize, ValidationError> {
        match limit.unwrap_or(self.config.default_limit) {
            0 => Err(ValidationError::InvalidLimit(0)),
            max => Ok(max),
        }
    }
}

fn window(
    from: Option<TimeInput>,
    till: Option<TimeInput>,
) -> Result<TimeWindow, ValidationError> {
    let window = TimeWindow::from_inputs(from, till)?;
    for bound in [window.from, window.till].into_iter().flatten() {
        check_instant(bound)?;
    }
    Ok(window)
}

fn check_source(source: &str) -> Result<(), ValidationError> {
    if source.trim().is_empty() {
        return Err(ValidationError::MissingSource);
    }
    check_key_part(source)
}

/// Keys encode four-digit years
fn check_instant(ts: DateTime<Utc>) -> Result<(), ValidationError> {
    if (0..=9999).contains(&ts.year()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimestamp(ts.to_rfc3339()))
    }
}
