//! Caller-facing operations over a [`Store`].
//!
//! Every operation takes a [`CallerContext`]. Reads apply the access filter
//! and the configured [`PrivateAccess`] policy; writes trust the caller and
//! leave authorization to the embedding service.

mod annotation;
mod namespace;
mod project;

use std::fs;
use std::sync::Arc;

use crate::access::{self, PrivateAccess};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::store::{SqliteStore, Store};
use crate::types::CallerContext;

pub struct PepAgent {
    store: Arc<dyn Store>,
    config: AgentConfig,
}

impl PepAgent {
    pub fn new(store: Arc<dyn Store>, config: AgentConfig) -> Self {
        Self { store, config }
    }

    /// Opens (and creates if needed) the SQLite database named by `config`.
    pub fn open(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = SqliteStore::new(&config.db_path)?;
        store.set_busy_timeout(config.busy_timeout())?;
        store.initialize()?;
        tracing::info!("Opened project store at {}", config.db_path.display());

        Ok(Self::new(Arc::new(store), config))
    }

    pub fn in_memory(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open_in_memory()?;
        store.initialize()?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn private_access(&self) -> PrivateAccess {
        self.config.private_access
    }

    fn reveal<T>(&self, item: T, visible: bool, what: impl std::fmt::Display) -> Result<T> {
        access::reveal(item, visible, what, self.private_access())
    }

    fn visibility(caller: &CallerContext) -> access::Visibility {
        access::Visibility::for_caller(caller)
    }
}
