//! # Event Store Core
//!
//! Core traits, types, and errors shared by the event store crates.
//!
//! ## Key Traits
//!
//! - [`OrderedStore`]: ordered column store with bounded range scans
//! - [`Clock`]: time abstraction for testability
//!
//! ## Key Types
//!
//! - [`Event`]: immutable timestamped record with a source and attributes
//! - [`TimeInput`]: instant, calendar date, or ISO-8601 text
//! - [`TimeWindow`]: inclusive query window carrying the reverse-order convention
//! - [`IndexDimension`]: partition key of a time index

pub mod dimension;
pub mod error;
pub mod event;
pub mod time;
pub mod traits;

// Re-export main types
pub use dimension::*;
pub use error::*;
pub use event::*;
pub use time::*;
pub use traits::*;
