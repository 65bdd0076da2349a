//! Configuration Module
//!
//! Handles loading server configuration from environment variables and the
//! optional positional port argument.

use std::env;

use crate::error::ConfigError;

/// Default number of keys the cache holds before evicting
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default memcached port
pub const DEFAULT_PORT: u16 = 11211;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of keys the cache can hold
    pub max_keys: usize,
    /// Interface to bind
    pub server_host: String,
    /// TCP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache keys (default: 10000)
    /// - `SERVER_HOST` - Bind interface (default: 0.0.0.0)
    /// - `SERVER_PORT` - TCP server port (default: 11211)
    pub fn from_env() -> Self {
        Self {
            max_keys: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
        }
    }

    /// Applies the positional arguments (program name excluded).
    ///
    /// At most one argument is accepted: the port to listen on.
    pub fn with_port_arg<I>(mut self, args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        match args.as_slice() {
            [] => Ok(self),
            [port] => {
                self.server_port = port
                    .parse()
                    .map_err(|_| ConfigError::Usage(format!("Invalid port: {}", port)))?;
                Ok(self)
            }
            _ => Err(ConfigError::Usage(
                "Usage: mini_memcached [port]".to_string(),
            )),
        }
    }

    /// Address string handed to the TCP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_CAPACITY,
            server_host: "0.0.0.0".to_string(),
            server_port: DEFAULT_PORT,
        }
    }
}
