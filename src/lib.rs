//! Mini Memcached - A lightweight in-memory cache server
//!
//! Speaks the `get`/`gets`/`set` subset of the memcached text protocol over
//! TCP, backed by a fixed-capacity LRU cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;

pub use config::Config;
pub use server::{serve, ServerState};
