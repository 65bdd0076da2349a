//! Connection Registry
//!
//! Shared table of live connections and their protocol state.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::protocol::SetHeader;

/// Process-unique handle for an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// == Connection State ==
/// Where a connection is in the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Expecting a command line
    #[default]
    Waiting,
    /// A `set` header was accepted; expecting `bytes + 2` raw bytes
    WaitingValue(SetHeader),
}

// == Connection Registry ==
/// Maps connection handles to their state behind a single lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionState>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a handle that has never been used in this registry.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // == Register ==
    /// Creates a `Waiting` entry for `id` unless one exists.
    ///
    /// Returns the entry's current state; re-registering leaves it untouched.
    pub async fn register(&self, id: ConnectionId) -> ConnectionState {
        let mut connections = self.connections.write().await;
        connections.entry(id).or_default().clone()
    }

    /// Current state of `id`, if registered.
    pub async fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.read().await.get(&id).cloned()
    }

    // == Update State ==
    /// Replaces the state of a registered connection.
    ///
    /// Returns `false` if `id` is not registered; nothing is inserted.
    pub async fn update_state(&self, id: ConnectionId, state: ConnectionState) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&id) {
            Some(slot) => {
                *slot = state;
                true
            }
            None => false,
        }
    }

    // == Remove ==
    /// Drops the entry for `id`. Removing an absent handle is a no-op.
    pub async fn remove(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
