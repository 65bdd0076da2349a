//! Error types for the cache server
//!
//! Provides unified error handling using thiserror. Each failure domain gets
//! its own enum: the cache, the wire protocol, a single connection and the
//! command line.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised by the cache store.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    /// Capacity outside `1..=max`
    #[error("Invalid capacity {capacity}: must be between 1 and {max}")]
    InvalidConfiguration { capacity: usize, max: usize },

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),
}

// == Protocol Error Enum ==
/// A command rejected by the protocol layer.
///
/// Protocol errors never close the connection: the offending command gets
/// its wire reply and the connection goes back to waiting for a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Too few tokens, or a line that is not UTF-8
    #[error("Malformed command line")]
    MalformedCommand,

    /// Key longer than the protocol allows
    #[error("Key of {0} bytes exceeds maximum length")]
    KeyTooLong(usize),

    /// `<bytes>` missing, negative, non-numeric or above the value limit
    #[error("Invalid value size")]
    InvalidValueSize,

    /// Payload did not match the length declared in the `set` header
    #[error("Bad data chunk: expected {expected} bytes, got {actual}")]
    BadDataChunk { expected: usize, actual: usize },

    /// First token is not a supported command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl ProtocolError {
    // == Wire Reply ==
    /// Returns the exact reply line sent to the client for this error.
    pub fn reply(&self) -> &'static [u8] {
        match self {
            ProtocolError::MalformedCommand | ProtocolError::UnknownCommand(_) => b"ERROR\r\n",
            ProtocolError::KeyTooLong(_) => b"CLIENT_ERROR bad command line format\r\n",
            ProtocolError::InvalidValueSize => b"CLIENT_ERROR Invalid size\r\n",
            ProtocolError::BadDataChunk { .. } => b"CLIENT_ERROR bad data chunk\r\n",
        }
    }
}

// == Connection Error Enum ==
/// Errors that end a single client connection.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Underlying socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream closed in the middle of a command line or payload
    #[error("Connection closed mid-message")]
    Truncated,

    /// Command line exceeded the length limit without a newline
    #[error("Command line longer than {0} bytes")]
    LineTooLong(usize),
}

// == Config Error Enum ==
/// Command line misuse.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    Usage(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache store.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_replies() {
        let test_cases = vec![
            (ProtocolError::MalformedCommand, &b"ERROR\r\n"[..]),
            (ProtocolError::UnknownCommand("incr".to_string()), &b"ERROR\r\n"[..]),
            (
                ProtocolError::KeyTooLong(251),
                &b"CLIENT_ERROR bad command line format\r\n"[..],
            ),
            (ProtocolError::InvalidValueSize, &b"CLIENT_ERROR Invalid size\r\n"[..]),
            (
                ProtocolError::BadDataChunk {
                    expected: 5,
                    actual: 3,
                },
                &b"CLIENT_ERROR bad data chunk\r\n"[..],
            ),
        ];

        for (error, expected) in test_cases {
            assert_eq!(error.reply(), expected, "wrong reply for {:?}", error);
        }
    }

    #[test]
    fn test_error_messages() {
        let err = CacheError::InvalidConfiguration {
            capacity: 0,
            max: 10,
        };
        assert_eq!(err.to_string(), "Invalid capacity 0: must be between 1 and 10");

        let err = ProtocolError::BadDataChunk {
            expected: 5,
            actual: 7,
        };
        assert!(err.to_string().contains("expected 5"));
    }

    #[test]
    fn test_connection_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: ConnectionError = io.into();
        assert!(matches!(err, ConnectionError::Io(_)));

        let err = ConnectionError::LineTooLong(65536);
        assert_eq!(err.to_string(), "Command line longer than 65536 bytes");
    }
}
