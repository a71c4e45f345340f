//! In-memory ordered store
//!
//! Suitable for testing and for embedding the engine without durability.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use eventstore_core::{Column, ColumnRange, OrderedStore, Row, RowQuery, StorageError};
use tracing::trace;

/// Access counters, useful to observe how much work a query did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of single-row scans served
    pub scans: usize,
    /// Columns returned by scans
    pub columns_read: usize,
    /// Row queries served
    pub row_queries: usize,
    /// Rows inspected by row queries
    pub rows_examined: usize,
}

/// In-memory implementation of [`OrderedStore`]
///
/// Uses `DashMap` for concurrent access to rows; each row is a `BTreeMap`
/// so range scans come back sorted.
#[derive(Debug, Default)]
pub struct InMemoryOrderedStore {
    rows: DashMap<String, BTreeMap<String, String>>,
    scans: AtomicUsize,
    columns_read: AtomicUsize,
    row_queries: AtomicUsize,
    rows_examined: AtomicUsize,
}

impl InMemoryOrderedStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows held
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in a row (0 when the row is absent)
    pub fn column_count(&self, row: &str) -> usize {
        self.rows.get(row).map(|r| r.len()).unwrap_or(0)
    }

    /// Snapshot of the access counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            scans: self.scans.load(Ordering::SeqCst),
            columns_read: self.columns_read.load(Ordering::SeqCst),
            row_queries: self.row_queries.load(Ordering::SeqCst),
            rows_examined: self.rows_examined.load(Ordering::SeqCst),
        }
    }

    /// Reset the access counters to zero
    pub fn reset_stats(&self) {
        self.scans.store(0, Ordering::SeqCst);
        self.columns_read.store(0, Ordering::SeqCst);
        self.row_queries.store(0, Ordering::SeqCst);
        self.rows_examined.store(0, Ordering::SeqCst);
    }
}

/// Turn optional inclusive bounds into `Bound`s, `None` when the range is empty
pub(crate) fn bounds(range: &ColumnRange) -> Option<(Bound<&str>, Bound<&str>)> {
    if let (Some(lo), Some(hi)) = (&range.lower, &range.upper)
        && lo > hi
    {
        return None;
    }
    let lower = range
        .lower
        .as_deref()
        .map_or(Bound::Unbounded, Bound::Included);
    let upper = range
        .upper
        .as_deref()
        .map_or(Bound::Unbounded, Bound::Included);
    Some((lower, upper))
}

#[async_trait]
impl OrderedStore for InMemoryOrderedStore {
    async fn put(&self, row: &str, column: &str, value: &str) -> Result<(), StorageError> {
        trace!(row, column, "put");
        self.rows
            .entry(row.to_string())
            .or_default()
            .insert(column.to_string(), value.to_string());
        Ok(())
    }

    async fn put_columns(&self, row: &str, columns: &[Column]) -> Result<(), StorageError> {
        trace!(row, count = columns.len(), "put columns");
        let mut entry = self.rows.entry(row.to_string()).or_default();
        for (column, value) in columns {
            entry.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    async fn scan(&self, row: &str, range: &ColumnRange) -> Result<Vec<Column>, StorageError> {
        self.scans.fetch_add(1, Ordering::SeqCst);

        let Some(columns) = self.rows.get(row) else {
            return Ok(Vec::new());
        };
        let Some(bounds) = bounds(range) else {
            return Ok(Vec::new());
        };

        let iter = columns.range::<str, _>(bounds);
        let result: Vec<Column> = if range.direction.is_reverse() {
            iter.rev()
                .take(range.limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            iter.take(range.limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        self.columns_read.fetch_add(result.len(), Ordering::SeqCst);
        Ok(result)
    }

    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Row>, StorageError> {
        self.row_queries.fetch_add(1, Ordering::SeqCst);

        let mut examined = 0;
        let mut rows = Vec::new();
        for entry in self.rows.iter() {
            examined += 1;
            if query.matches(entry.key(), entry.value()) {
                rows.push(Row {
                    key: entry.key().clone(),
                    columns: entry.value().clone(),
                });
            }
        }

        self.rows_examined.fetch_add(examined, Ordering::SeqCst);
        trace!(matched = rows.len(), examined, "row query");
        Ok(rows)
    }
}
