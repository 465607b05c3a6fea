//! Configuration for the autocomplete engine.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutocompleteError, Result};

/// Default number of document keys fetched per hydration batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default lifetime of a cached multi-term intersection.
pub const DEFAULT_INTERSECTION_TTL: Duration = Duration::from_secs(60);

/// How documents are laid out in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// One sorted set per word prefix, scored by document rank. Supports
    /// multi-word queries through intersection.
    #[default]
    Prefixes,

    /// One sorted set per index holding `term::score::key` members, queried
    /// by lexicographic range. Smaller, but only matches the start of the
    /// whole term.
    Terms,
}

impl TryFrom<i32> for IndexType {
    type Error = AutocompleteError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(IndexType::Prefixes),
            1 => Ok(IndexType::Terms),
            other => Err(AutocompleteError::invalid_index_type(other.to_string())),
        }
    }
}

impl FromStr for IndexType {
    type Err = AutocompleteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "prefixes" | "prefix" => Ok(IndexType::Prefixes),
            "terms" | "term" => Ok(IndexType::Terms),
            _ => Err(AutocompleteError::invalid_index_type(s)),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexType::Prefixes => write!(f, "prefixes"),
            IndexType::Terms => write!(f, "terms"),
        }
    }
}

/// Configuration for [`Autocomplete`](crate::Autocomplete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocompleteConfig {
    /// Global prefix of every key written by the engine.
    pub prefix: String,

    /// Indexing strategy.
    pub index_type: IndexType,

    /// Number of document keys fetched per hydration request.
    pub batch_size: usize,

    /// Lifetime of the cached intersection of a multi-term query.
    pub intersection_ttl: Duration,

    /// How many times an optimistic transaction is retried after losing a
    /// race with another writer.
    pub max_transaction_retries: usize,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        AutocompleteConfig {
            prefix: "ac".to_string(),
            index_type: IndexType::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            intersection_ttl: DEFAULT_INTERSECTION_TTL,
            max_transaction_retries: 16,
        }
    }
}

impl AutocompleteConfig {
    /// Create a configuration for the given prefix and strategy.
    pub fn new(prefix: impl Into<String>, index_type: IndexType) -> Self {
        AutocompleteConfig {
            prefix: prefix.into(),
            index_type,
            ..Default::default()
        }
    }

    /// Set the hydration batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the intersection cache lifetime.
    pub fn with_intersection_ttl(mut self, ttl: Duration) -> Self {
        self.intersection_ttl = ttl;
        self
    }

    /// Set the optimistic transaction retry bound.
    pub fn with_max_transaction_retries(mut self, retries: usize) -> Self {
        self.max_transaction_retries = retries;
        self
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AutocompleteError::invalid_config(
                "batch_size must be greater than 0",
            ));
        }
        if self.intersection_ttl.as_secs() == 0 {
            return Err(AutocompleteError::invalid_config(
                "intersection_ttl must be at least one second",
            ));
        }
        Ok(())
    }
}
