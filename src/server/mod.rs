//! Server Module
//!
//! Per-connection protocol handling and the shared state it runs against.

mod connection;
mod listener;
mod registry;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::{CacheStore, SharedCache};
use crate::config::Config;
use crate::error::Result;

pub use connection::Connection;
pub use listener::serve;
pub use registry::{ConnectionId, ConnectionRegistry, ConnectionState};

/// State shared by every connection task.
///
/// Built once at startup and cloned into each task; clones share the same
/// cache and registry.
#[derive(Clone)]
pub struct ServerState {
    /// LRU cache store
    pub cache: SharedCache,
    /// Live connections and their protocol state
    pub connections: Arc<ConnectionRegistry>,
}

impl ServerState {
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Builds the cache from configuration.
    ///
    /// Fails if the configured capacity is out of range.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(CacheStore::new(config.max_keys)?))
    }
}
