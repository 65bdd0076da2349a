//! Cache Module
//!
//! Provides a fixed-capacity in-memory cache with LRU eviction.

mod entry;
mod lru;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::CacheStore;

/// Cache store shared by every connection task.
///
/// Lookups take the write lock too: `get` reorders the LRU list.
pub type SharedCache = Arc<RwLock<CacheStore>>;

// == Public Constants ==
/// Largest capacity a store may be created with
pub const MAX_CAPACITY: usize = 1024 * 1024;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 250;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 64 * 1024 * 1024; // 64 MiB
