//! Service configuration
//!
//! Loaded from TOML; every field has a default so a partial file works.
//!
//! ```toml
//! default_limit = 1000000
//! strategy = "clustered"
//!
//! [cluster]
//! capacity = 1000
//! directory_prefetch = 5
//! cached_dimensions = 10000
//!
//! [dimensions]
//! lot_attribute = "LOTNAME"
//! process_attribute = "PROCESSID"
//!
//! [storage.redb]
//! db_path = "./data/eventstore.redb"
//! ```

use std::path::Path;

use eventstore_core::{KEY_SEPARATOR, RESERVED_PREFIX, StorageError};
use eventstore_index::{ClusterConfig, IndexStrategyKind};
use eventstore_logging::{EventStoreSubscriberBuilder, LogConfig, LoggingError, WorkerGuard};
use eventstore_storage::RedbStoreConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or applying configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(String),

    #[error("Cannot parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Cannot open storage: {0}")]
    Storage(#[from] StorageError),
}

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Result limit applied when a caller omits one
    pub default_limit: usize,
    /// Index strategy used for every query
    pub strategy: IndexStrategyKind,
    /// Sizing of the clustered index
    pub cluster: ClusterConfig,
    /// Attribute names backing the secondary dimensions
    pub dimensions: DimensionConfig,
    /// Ordered store backend
    pub storage: StorageConfig,
    pub logging: LogConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_limit: 1_000_000,
            strategy: IndexStrategyKind::default(),
            cluster: ClusterConfig::default(),
            dimensions: DimensionConfig::default(),
            storage: StorageConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Attribute names of the lot and process dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionConfig {
    pub lot_attribute: String,
    pub process_attribute: String,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            lot_attribute: "LOTNAME".to_string(),
            process_attribute: "PROCESSID".to_string(),
        }
    }
}

impl DimensionConfig {
    /// Attributes indexed as secondary dimensions
    pub fn secondary_fields(&self) -> [String; 2] {
        [self.lot_attribute.clone(), self.process_attribute.clone()]
    }
}

/// Ordered store backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageConfig {
    /// Non-durable in-process store
    #[default]
    Memory,
    /// Persistent redb database
    Redb(RedbStoreConfig),
}

impl ServiceConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid("default_limit must be > 0".into()));
        }
        if self.cluster.capacity == 0 {
            return Err(ConfigError::Invalid("cluster.capacity must be > 0".into()));
        }
        if self.cluster.directory_prefetch == 0 {
            return Err(ConfigError::Invalid(
                "cluster.directory_prefetch must be > 0".into(),
            ));
        }
        for attribute in self.dimensions.secondary_fields() {
            if attribute.is_empty()
                || attribute.starts_with(RESERVED_PREFIX)
                || attribute.contains(KEY_SEPARATOR)
            {
                return Err(ConfigError::Invalid(format!(
                    "dimension attribute {attribute:?} is not a valid attribute key"
                )));
            }
        }
        Ok(())
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_strategy(mut self, strategy: IndexStrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Install the global tracing subscriber described by `logging`
    pub fn init_logging(&self) -> Result<Option<WorkerGuard>, LoggingError> {
        EventStoreSubscriberBuilder::new()
            .with_config(self.logging.clone())
            .try_init()
    }
}
