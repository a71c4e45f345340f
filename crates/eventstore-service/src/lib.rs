//! # Event Store Service
//!
//! The public store/find contract consumed by transport adapters.
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventstore_service::{EventService, ServiceConfig};
//!
//! let service = EventService::open(ServiceConfig::load("eventstore.toml")?)?;
//! service.store_now("press-7", attributes).await?;
//!
//! // The ten most recent events, newest first
//! let recent = service
//!     .find("press-7", Some(now.into()), Some(day_start.into()), Some(10))
//!     .await?;
//! ```

pub mod config;
pub mod service;

pub use config::{ConfigError, DimensionConfig, ServiceConfig, StorageConfig};
pub use service::EventService;
