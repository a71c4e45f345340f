//! Cluster directory entries
//!
//! The directory row of a dimension maps each sealed cluster's latest
//! timestamp to its id (`<latest>#<cluster-id>` → id) and names the open
//! cluster under [`OPEN_SENTINEL`], which sorts after every timestamp.

use eventstore_core::{Column, ColumnRange, Direction, OrderedStore, StorageError};

use crate::keys::{ENTRY_SEPARATOR, OPEN_SENTINEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DirectoryEntry {
    Sealed { latest: String, cluster_id: String },
    Open { cluster_id: String },
}

impl DirectoryEntry {
    pub(crate) fn parse(row: &str, (column, value): Column) -> Result<Self, StorageError> {
        if value.is_empty() {
            return Err(StorageError::corrupted(
                row,
                format!("directory column {column:?} has no cluster id"),
            ));
        }
        if column == OPEN_SENTINEL {
            return Ok(Self::Open { cluster_id: value });
        }
        match column.split_once(ENTRY_SEPARATOR) {
            Some((latest, _)) => Ok(Self::Sealed {
                latest: latest.to_string(),
                cluster_id: value,
            }),
            None => Err(StorageError::corrupted(
                row,
                format!("malformed directory column {column:?}"),
            )),
        }
    }

    pub(crate) fn cluster_id(&self) -> &str {
        match self {
            Self::Sealed { cluster_id, .. } | Self::Open { cluster_id } => cluster_id,
        }
    }
}

/// Column under which a sealed cluster is registered
pub(crate) fn sealed_column(latest: &str, cluster_id: &str) -> String {
    format!("{latest}{ENTRY_SEPARATOR}{cluster_id}")
}

/// Pages through a directory row a bounded window at a time
///
/// Each re-scan resumes at the last column returned and drops it, so no
/// column is yielded twice.
pub(crate) struct DirectoryPager {
    row: String,
    range: ColumnRange,
    page_size: usize,
    resume: Option<String>,
    exhausted: bool,
}

impl DirectoryPager {
    pub(crate) fn new(row: String, range: ColumnRange, page_size: usize) -> Self {
        Self {
            row,
            range,
            page_size: page_size.max(1),
            resume: None,
            exhausted: false,
        }
    }

    pub(crate) fn row(&self) -> &str {
        &self.row
    }

    pub(crate) async fn next_page(
        &mut self,
        store: &dyn OrderedStore,
    ) -> Result<Option<Vec<Column>>, StorageError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut range = self.range.clone();
        if let Some(resume) = &self.resume {
            match range.direction {
                Direction::Ascending => range.lower = Some(resume.clone()),
                Direction::Descending => range.upper = Some(resume.clone()),
            }
        }
        let request = self.page_size + usize::from(self.resume.is_some());

        let mut page = store.scan(&self.row, &range.limit(request)).await?;
        if page.len() < request {
            self.exhausted = true;
        }
        if let Some(resume) = &self.resume
            && page.first().is_some_and(|(column, _)| column == resume)
        {
            page.remove(0);
        }

        match page.last() {
            Some((column, _)) => self.resume = Some(column.clone()),
            None => {
                self.exhausted = true;
                return Ok(None);
            }
        }
        Ok(Some(page))
    }
}
