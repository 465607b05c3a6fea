//! # Autocomplete
//!
//! Prefix autocomplete indexing and search on top of a sorted-set key/value
//! store.
//!
//! Documents name themselves with an id and a free-text term, and carry a
//! JSON payload. Two indexing strategies are available:
//!
//! - **Prefixes**: one sorted set per word prefix, scored by rank. Every word
//!   of the term is searchable and multi-word queries intersect their sets.
//! - **Terms**: a single sorted set of `term::score::key` members queried by
//!   lexicographic range. Only the start of the whole term is searchable.
//!
//! The store is reached through the [`storage::StorePool`] and
//! [`storage::StoreConnection`] traits. [`storage::MemoryStore`] implements
//! them in-process.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use autocomplete::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Car {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Document for Car {
//!     type Payload = Car;
//!
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn term(&self) -> &str {
//!         &self.name
//!     }
//!
//!     fn payload(&self) -> &Car {
//!         self
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new_default());
//! let engine = Autocomplete::new(store, "ac", IndexType::Prefixes);
//!
//! let car = Car { id: "1".into(), name: "Mercedes S500".into() };
//! engine.index("cars", &car, 10).await?;
//!
//! let found: Vec<Car> = engine.search_as("cars", "s5", SortOrder::Score).await?;
//! assert_eq!(found[0].name, "Mercedes S500");
//! # Ok::<(), AutocompleteError>(())
//! # }).unwrap();
//! ```

pub mod analysis;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod index;
pub mod keys;
pub mod score;
pub mod scripts;
pub mod search;
pub mod storage;

pub use config::{AutocompleteConfig, IndexType};
pub use document::Document;
pub use engine::Autocomplete;
pub use error::{AutocompleteError, Result};
pub use search::SortOrder;

pub mod prelude {
    pub use crate::config::{AutocompleteConfig, IndexType};
    pub use crate::document::Document;
    pub use crate::engine::Autocomplete;
    pub use crate::error::{AutocompleteError, Result};
    pub use crate::search::SortOrder;
    pub use crate::storage::{MemoryStore, MemoryStoreConfig, StoreConnection, StorePool};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
