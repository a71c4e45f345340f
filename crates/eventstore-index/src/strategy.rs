//! The range index abstraction shared by both strategies

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use eventstore_core::{Event, EventStoreResult, IndexDimension, TimeWindow};
use serde::{Deserialize, Serialize};

/// A time-range index over stored events
///
/// Implementations return events inside the inclusive window, ordered
/// chronologically, or reverse-chronologically when the window's `till`
/// precedes its `from`, and never more than `max` of them.
#[async_trait]
pub trait RangeIndex: Send + Sync {
    /// Short strategy name used in logs and errors
    fn name(&self) -> &'static str;

    /// Persist an event and every index entry pointing at it
    async fn store(&self, event: &Event) -> EventStoreResult<()>;

    /// Events of one dimension within `window`, at most `max`
    async fn find(
        &self,
        dimension: &IndexDimension,
        window: &TimeWindow,
        max: usize,
    ) -> EventStoreResult<Vec<Event>>;
}

#[async_trait]
impl<T: RangeIndex + ?Sized> RangeIndex for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn store(&self, event: &Event) -> EventStoreResult<()> {
        (**self).store(event).await
    }

    async fn find(
        &self,
        dimension: &IndexDimension,
        window: &TimeWindow,
        max: usize,
    ) -> EventStoreResult<Vec<Event>> {
        (**self).find(dimension, window, max).await
    }
}

/// Which index strategy to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStrategyKind {
    /// Equality-filtered fetch followed by an in-memory sort
    Flat,
    /// Capacity-bounded, time-disjoint clusters with a directory
    #[default]
    Clustered,
}

impl fmt::Display for IndexStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Clustered => write!(f, "clustered"),
        }
    }
}
