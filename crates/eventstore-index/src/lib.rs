//! # Event Store Index
//!
//! Range index strategies over an [`OrderedStore`](eventstore_core::OrderedStore).
//!
//! ## Strategies
//!
//! - [`FlatRangeIndex`]: one row per event, equality-filtered fetch, in-memory sort
//! - [`ClusteredTimeIndex`]: chained, capacity-bounded clusters with a
//!   per-dimension directory; ordered, bounded scans on read
//!
//! Both implement [`RangeIndex`] and return identical results for the
//! same data. [`find_many`] fans a query out over several sources and
//! merges the results with [`merge_ordered`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventstore_core::{Event, IndexDimension, TimeWindow};
//! use eventstore_index::{ClusterConfig, ClusteredTimeIndex, RangeIndex};
//! use eventstore_storage::InMemoryOrderedStore;
//!
//! let index = ClusteredTimeIndex::new(InMemoryOrderedStore::new(), ClusterConfig::default());
//! index.store(&event).await?;
//! let recent = index
//!     .find(&IndexDimension::source("tester"), &TimeWindow::new(Some(now), Some(start)), 10)
//!     .await?;
//! ```

pub mod clustered;
pub mod flat;
pub mod keys;
pub mod merge;
pub mod record;
pub mod strategy;

pub use clustered::{ClusterConfig, ClusteredTimeIndex};
pub use flat::FlatRangeIndex;
pub use merge::{find_many, merge_ordered};
pub use strategy::{IndexStrategyKind, RangeIndex};
