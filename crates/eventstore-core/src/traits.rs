//! Core traits for the event store
//!
//! ## Key Traits
//!
//! - [`OrderedStore`]: the ordered column store the indexes are built on
//! - [`Clock`]: time abstraction for testability

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::time::Direction;

/// A `(column key, value)` pair returned by a scan
pub type Column = (String, String);

/// Bounded scan over the columns of a single row
///
/// Bounds are inclusive; `None` leaves that side open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRange {
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub direction: Direction,
    pub limit: usize,
}

impl ColumnRange {
    /// Every column of the row, ascending
    pub fn all() -> Self {
        Self {
            lower: None,
            upper: None,
            direction: Direction::Ascending,
            limit: usize::MAX,
        }
    }

    pub fn new(lower: Option<String>, upper: Option<String>) -> Self {
        Self {
            lower,
            upper,
            ..Self::all()
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn reversed(self) -> Self {
        self.direction(Direction::Descending)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A full row returned by [`OrderedStore::query_rows`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub columns: BTreeMap<String, String>,
}

/// Equality-filtered row query with a range predicate on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    /// Only rows whose key starts with this prefix
    pub row_prefix: String,
    /// Columns that must hold exactly these values
    pub equals: Vec<Column>,
    /// Column the range predicate applies to
    pub range_column: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
}

impl RowQuery {
    /// Whether a row satisfies every predicate of the query
    pub fn matches(&self, key: &str, columns: &BTreeMap<String, String>) -> bool {
        if !key.starts_with(&self.row_prefix) {
            return false;
        }
        let equal = self
            .equals
            .iter()
            .all(|(name, value)| columns.get(name) == Some(value));
        if !equal {
            return false;
        }
        match columns.get(&self.range_column) {
            Some(value) => {
                self.lower.as_deref().is_none_or(|lo| value.as_str() >= lo)
                    && self.upper.as_deref().is_none_or(|hi| value.as_str() <= hi)
            }
            None => false,
        }
    }
}

/// Abstraction over an ordered column store
///
/// Per row key the store keeps a sorted map of column keys to values and
/// supports bounded ascending/descending range scans. Durability,
/// replication and request timeouts belong to the implementation; the
/// engine performs no retries and treats every error as final.
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Write one column, replacing any previous value
    async fn put(&self, row: &str, column: &str, value: &str) -> Result<(), StorageError>;

    /// Write several columns of one row
    async fn put_columns(&self, row: &str, columns: &[Column]) -> Result<(), StorageError> {
        for (column, value) in columns {
            self.put(row, column, value).await?;
        }
        Ok(())
    }

    /// Range-scan the columns of a row
    ///
    /// Returns at most `range.limit` columns in `range.direction` order.
    /// A missing row yields an empty result.
    async fn scan(&self, row: &str, range: &ColumnRange) -> Result<Vec<Column>, StorageError>;

    /// Fetch every row matching the equality filters and range predicate
    ///
    /// Row order is unspecified.
    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Row>, StorageError>;
}

#[async_trait]
impl<T: OrderedStore + ?Sized> OrderedStore for Arc<T> {
    async fn put(&self, row: &str, column: &str, value: &str) -> Result<(), StorageError> {
        (**self).put(row, column, value).await
    }

    async fn put_columns(&self, row: &str, columns: &[Column]) -> Result<(), StorageError> {
        (**self).put_columns(row, columns).await
    }

    async fn scan(&self, row: &str, range: &ColumnRange) -> Result<Vec<Column>, StorageError> {
        (**self).scan(row, range).await
    }

    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Row>, StorageError> {
        (**self).query_rows(query).await
    }
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Test that the OrderedStore trait is object-safe
    fn _assert_object_safe(_: &dyn OrderedStore) {}

    fn columns(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_column_range_builders() {
        let range = ColumnRange::new(Some("b".into()), Some("d".into()))
            .reversed()
            .limit(3);
        assert_eq!(range.lower.as_deref(), Some("b"));
        assert_eq!(range.upper.as_deref(), Some("d"));
        assert!(range.direction.is_reverse());
        assert_eq!(range.limit, 3);
        assert_eq!(ColumnRange::all().limit, usize::MAX);
    }

    #[test]
    fn test_row_query_matches() {
        let query = RowQuery {
            row_prefix: "flat".into(),
            equals: vec![("_source".into(), "s1".into())],
            range_column: "_timestamp".into(),
            lower: Some("2010".into()),
            upper: None,
        };
        let row = columns(&[("_source", "s1"), ("_timestamp", "2011")]);
        assert!(query.matches("flat/1", &row));
        assert!(!query.matches("rec/1", &row));

        let wrong_source = columns(&[("_source", "s2"), ("_timestamp", "2011")]);
        assert!(!query.matches("flat/1", &wrong_source));

        let too_early = columns(&[("_source", "s1"), ("_timestamp", "2009")]);
        assert!(!query.matches("flat/1", &too_early));

        let no_range_column = columns(&[("_source", "s1")]);
        assert!(!query.matches("flat/1", &no_range_column));
    }

    #[test]
    fn test_manual_clock() {
        let start = Utc.with_ymd_and_hms(2010, 1, 2, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(5));

        let shared = clock.clone();
        shared.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
