//! Persistent ordered store backed by redb
//!
//! All rows live in one table whose keys are `<row>\0<column>`, so the
//! columns of a row are contiguous and sorted in the B-tree and a column
//! range maps onto a single key range.

use std::ops::Bound;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use eventstore_core::{Column, ColumnRange, OrderedStore, Row, RowQuery, StorageError};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use crate::memory::bounds;

// Key: row and column joined by ROW_SEPARATOR, Value: column value
const COLUMNS: TableDefinition<&str, &str> = TableDefinition::new("columns");

const ROW_SEPARATOR: char = '\0';
/// Smallest character greater than ROW_SEPARATOR, bounds a row from above
const ROW_END: char = '\u{1}';

/// Configuration for the redb store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedbStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
    /// Cache size in bytes
    pub cache_size: usize,
}

impl Default for RedbStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/eventstore.redb"),
            cache_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl RedbStoreConfig {
    /// Create config for a database file
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }
}

fn backend(err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn composite_key(row: &str, column: &str) -> String {
    format!("{row}{ROW_SEPARATOR}{column}")
}

fn check_row_key(row: &str) -> Result<(), StorageError> {
    if row.contains(ROW_SEPARATOR) {
        return Err(StorageError::backend(format!(
            "row key may not contain NUL: {row:?}"
        )));
    }
    Ok(())
}

/// redb implementation of [`OrderedStore`]
pub struct RedbOrderedStore {
    db: Arc<Database>,
    config: RedbStoreConfig,
}

impl RedbOrderedStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbStoreConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = redb::Builder::new()
            .set_cache_size(config.cache_size)
            .create(&config.db_path)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        info!("Opened redb database");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        write_txn.open_table(COLUMNS).map_err(backend)?;
        write_txn.commit().map_err(backend)?;
        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &RedbStoreConfig {
        &self.config
    }
}

#[async_trait]
impl OrderedStore for RedbOrderedStore {
    async fn put(&self, row: &str, column: &str, value: &str) -> Result<(), StorageError> {
        self.put_columns(row, &[(column.to_string(), value.to_string())])
            .await
    }

    async fn put_columns(&self, row: &str, columns: &[Column]) -> Result<(), StorageError> {
        check_row_key(row)?;
        trace!(row, count = columns.len(), "put columns");

        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(COLUMNS).map_err(backend)?;
            for (column, value) in columns {
                let key = composite_key(row, column);
                table.insert(key.as_str(), value.as_str()).map_err(backend)?;
            }
        }
        write_txn.commit().map_err(backend)?;
        Ok(())
    }

    async fn scan(&self, row: &str, range: &ColumnRange) -> Result<Vec<Column>, StorageError> {
        check_row_key(row)?;
        let Some((lower, upper)) = bounds(range) else {
            return Ok(Vec::new());
        };

        let start = match lower {
            Bound::Included(lo) => composite_key(row, lo),
            _ => composite_key(row, ""),
        };
        let (end, end_inclusive) = match upper {
            Bound::Included(hi) => (composite_key(row, hi), true),
            _ => (format!("{row}{ROW_END}"), false),
        };
        let end_bound = if end_inclusive {
            Bound::Included(end.as_str())
        } else {
            Bound::Excluded(end.as_str())
        };

        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(COLUMNS).map_err(backend)?;
        let entries = table
            .range::<&str>((Bound::Included(start.as_str()), end_bound))
            .map_err(backend)?;

        let prefix_len = row.len() + ROW_SEPARATOR.len_utf8();
        let mut result = Vec::new();
        if range.direction.is_reverse() {
            for entry in entries.rev().take(range.limit) {
                let (key, value) = entry.map_err(backend)?;
                result.push((
                    key.value()[prefix_len..].to_string(),
                    value.value().to_string(),
                ));
            }
        } else {
            for entry in entries.take(range.limit) {
                let (key, value) = entry.map_err(backend)?;
                result.push((
                    key.value()[prefix_len..].to_string(),
                    value.value().to_string(),
                ));
            }
        }
        Ok(result)
    }

    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Row>, StorageError> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(COLUMNS).map_err(backend)?;
        let entries = table
            .range::<&str>(query.row_prefix.as_str()..)
            .map_err(backend)?;

        let mut rows = Vec::new();
        let mut current: Option<Row> = None;

        for entry in entries {
            let (key, value) = entry.map_err(backend)?;
            let key = key.value();
            if !key.starts_with(&query.row_prefix) {
                break;
            }
            let Some((row_key, column)) = key.split_once(ROW_SEPARATOR) else {
                return Err(StorageError::corrupted(key, "missing row separator"));
            };

            if current.as_ref().is_none_or(|row| row.key != row_key) {
                if let Some(done) = current.take()
                    && query.matches(&done.key, &done.columns)
                {
                    rows.push(done);
                }
                current = Some(Row {
                    key: row_key.to_string(),
                    columns: Default::default(),
                });
            }
            if let Some(row) = current.as_mut() {
                row.columns
                    .insert(column.to_string(), value.value().to_string());
            }
        }

        if let Some(done) = current
            && query.matches(&done.key, &done.columns)
        {
            rows.push(done);
        }

        trace!(matched = rows.len(), "row query");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbOrderedStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStoreConfig::new(temp_dir.path().join("test.redb"));
        (RedbOrderedStore::open(config).unwrap(), temp_dir)
    }

    #[tokio::test]
    async fn test_scan_stays_within_row() {
        let (store, _temp) = create_test_store();
        store.put("a", "1", "x").await.unwrap();
        store.put("ab", "0", "y").await.unwrap();
        store.put("a", "2", "z").await.unwrap();

        let columns = store.scan("a", &ColumnRange::all()).await.unwrap();
        assert_eq!(
            columns,
            vec![
                ("1".to_string(), "x".to_string()),
                ("2".to_string(), "z".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_reverse_with_bounds() {
        let (store, _temp) = create_test_store();
        for c in ["a", "b", "c", "d"] {
            store.put("row", c, c).await.unwrap();
        }
        let range = ColumnRange::new(Some("b".into()), None).reversed().limit(2);
        let columns = store.scan("row", &range).await.unwrap();
        let keys: Vec<_> = columns.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["d", "c"]);
    }

    #[tokio::test]
    async fn test_rejects_nul_in_row_key() {
        let (store, _temp) = create_test_store();
        assert!(store.put("bad\0row", "c", "v").await.is_err());
    }

    #[tokio::test]
    async fn test_query_rows_groups_columns() {
        let (store, _temp) = create_test_store();
        store
            .put_columns(
                "f/1",
                &[
                    ("_source".into(), "s1".into()),
                    ("_timestamp".into(), "5".into()),
                    ("k".into(), "v".into()),
                ],
            )
            .await
            .unwrap();
        store
            .put_columns(
                "f/2",
                &[
                    ("_source".into(), "s2".into()),
                    ("_timestamp".into(), "5".into()),
                ],
            )
            .await
            .unwrap();
        store.put("g/1", "_source", "s1").await.unwrap();

        let query = RowQuery {
            row_prefix: "f/".into(),
            equals: vec![("_source".into(), "s1".into())],
            range_column: "_timestamp".into(),
            lower: None,
            upper: Some("9".into()),
        };
        let rows = store.query_rows(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "f/1");
        assert_eq!(rows[0].columns.len(), 3);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let config = RedbStoreConfig::new(temp_dir.path().join("test.redb"));
        {
            let store = RedbOrderedStore::open(config.clone()).unwrap();
            store.put("row", "col", "value").await.unwrap();
        }
        let store = RedbOrderedStore::open(config).unwrap();
        let columns = store.scan("row", &ColumnRange::all()).await.unwrap();
        assert_eq!(columns, vec![("col".to_string(), "value".to_string())]);
    }
}
