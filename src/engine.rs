//! The autocomplete engine handle.
//!
//! [`Autocomplete`] binds a connection pool, a key space and an indexing
//! strategy. Writes live in [`crate::index`], reads in [`crate::search`].
//! The handle holds no connection of its own: every operation acquires one
//! from the pool and releases it before returning, so a single handle can be
//! cloned and shared across tasks.

use std::sync::Arc;

use log::debug;

use crate::config::{AutocompleteConfig, IndexType};
use crate::error::Result;
use crate::keys::KeySpace;
use crate::scripts::ScriptTable;
use crate::storage::{StoreConnection, StorePool};

/// Autocomplete indexing and search over a sorted-set store.
#[derive(Debug, Clone)]
pub struct Autocomplete {
    pool: Arc<dyn StorePool>,
    config: AutocompleteConfig,
    keys: KeySpace,
    scripts: Arc<ScriptTable>,
}

impl Autocomplete {
    /// Create an engine with default settings for everything but the key
    /// prefix and the indexing strategy.
    pub fn new(pool: Arc<dyn StorePool>, prefix: impl Into<String>, index_type: IndexType) -> Self {
        let config = AutocompleteConfig::new(prefix, index_type);
        Self::build(pool, config)
    }

    /// Create an engine from a full configuration.
    pub fn with_config(pool: Arc<dyn StorePool>, config: AutocompleteConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(pool, config))
    }

    fn build(pool: Arc<dyn StorePool>, config: AutocompleteConfig) -> Self {
        debug!(
            "autocomplete engine under prefix {:?} using {} indexing",
            config.prefix, config.index_type
        );

        Autocomplete {
            pool,
            keys: KeySpace::new(config.prefix.clone()),
            config,
            scripts: Arc::new(ScriptTable::new()),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &AutocompleteConfig {
        &self.config
    }

    /// The indexing strategy.
    pub fn index_type(&self) -> IndexType {
        self.config.index_type
    }

    /// The global key prefix.
    pub fn prefix(&self) -> &str {
        self.keys.prefix()
    }

    /// Key names used by this engine.
    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    /// Scripts registered for the term index.
    pub fn scripts(&self) -> &ScriptTable {
        &self.scripts
    }

    /// The connection pool.
    pub fn pool(&self) -> &Arc<dyn StorePool> {
        &self.pool
    }

    pub(crate) async fn connection(&self) -> Result<Box<dyn StoreConnection>> {
        self.pool.get().await
    }
}
