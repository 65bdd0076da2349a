//! Command Parser
//!
//! Turns one framed command line into a [`Command`].

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::ProtocolError;

/// Token accepted as the optional last argument of `set`
pub const NOREPLY: &str = "noreply";

// == Set Header ==
/// Parsed `set <key> <flags> <exptime> <bytes> [noreply]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetHeader {
    pub key: String,
    pub flags: u32,
    pub exptime: i64,
    /// Declared payload length, terminator excluded
    pub bytes: usize,
    pub noreply: bool,
}

// == Command ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Header of a two-phase store; the payload follows on the stream
    Set(SetHeader),
    /// `get` or `gets`
    Get { keys: Vec<String> },
}

/// Parses a command line with its terminator already stripped.
pub fn parse_command(line: &str) -> Result<Command, ProtocolError> {
    let tokens: Vec<&str> = line.split_ascii_whitespace().collect();

    match tokens.first().copied() {
        Some("set") => parse_set(&tokens).map(Command::Set),
        Some("get") | Some("gets") => parse_get(&tokens),
        Some(other) => Err(ProtocolError::UnknownCommand(other.to_string())),
        None => Err(ProtocolError::UnknownCommand(String::new())),
    }
}

fn parse_set(tokens: &[&str]) -> Result<SetHeader, ProtocolError> {
    if tokens.len() < 5 {
        return Err(ProtocolError::MalformedCommand);
    }

    let key = tokens[1];
    if key.len() > MAX_KEY_LENGTH {
        return Err(ProtocolError::KeyTooLong(key.len()));
    }

    let bytes = tokens[4]
        .parse::<usize>()
        .ok()
        .filter(|&size| size <= MAX_VALUE_SIZE)
        .ok_or(ProtocolError::InvalidValueSize)?;

    // Metadata is opaque to the server: anything unparseable is stored as 0
    let flags = tokens[2].parse::<u32>().unwrap_or(0);
    let exptime = tokens[3].parse::<i64>().unwrap_or(0);

    // Trailing tokens past `noreply` are ignored
    let noreply = tokens.get(5) == Some(&NOREPLY);

    Ok(SetHeader {
        key: key.to_string(),
        flags,
        exptime,
        bytes,
        noreply,
    })
}

/// `get` with no keys is a lookup of nothing and still answers `END`.
fn parse_get(tokens: &[&str]) -> Result<Command, ProtocolError> {
    let keys = tokens[1..].iter().map(|key| key.to_string()).collect();
    Ok(Command::Get { keys })
}
