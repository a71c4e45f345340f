//! # Event Store Storage
//!
//! Backends for the [`OrderedStore`] abstraction the indexes are built on.
//!
//! ## Features
//!
//! - **InMemoryOrderedStore**: `DashMap` of sorted rows, for tests and embedding
//! - **RedbOrderedStore**: persistent backend on a single redb table
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventstore_core::{ColumnRange, OrderedStore};
//! use eventstore_storage::InMemoryOrderedStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryOrderedStore::new();
//!     store.put("row", "b", "2").await.unwrap();
//!     store.put("row", "a", "1").await.unwrap();
//!
//!     let columns = store.scan("row", &ColumnRange::all()).await.unwrap();
//!     assert_eq!(columns[0].0, "a");
//! }
//! ```

pub mod memory;
pub mod persistent;

pub use memory::{InMemoryOrderedStore, StoreStats};
pub use persistent::{RedbOrderedStore, RedbStoreConfig};

// Re-export the trait for convenience
pub use eventstore_core::OrderedStore;
