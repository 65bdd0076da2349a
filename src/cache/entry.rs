//! Cache Entry Module
//!
//! Defines the structure for individual cache entries.

use bytes::Bytes;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// `flags` and `exptime` are recorded exactly as the client sent them on
/// `set`. They are never enforced and never returned: `get` always reports
/// flags `0` and entries only leave the cache through eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: Bytes,
    /// Client-supplied opaque flags
    pub flags: u32,
    /// Client-supplied expiration time
    pub exptime: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry with zeroed metadata.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: value.into(),
            flags: 0,
            exptime: 0,
        }
    }

    /// Creates an entry carrying the metadata from a `set` header.
    pub fn with_metadata(value: impl Into<Bytes>, flags: u32, exptime: i64) -> Self {
        Self {
            value: value.into(),
            flags,
            exptime,
        }
    }

    // == Size ==
    /// Length of the stored value in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }
}
