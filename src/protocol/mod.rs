//! Protocol Module
//!
//! The memcached text protocol subset served here:
//!
//! - `set <key> <flags> <exptime> <bytes> [noreply]\r\n<payload>\r\n` -> `STORED`
//! - `get|gets <key>...\r\n` -> `VALUE <key> 0 <len>\r\n<data>\r\n` per hit, then `END`
//!
//! Anything else is rejected with `ERROR` or a `CLIENT_ERROR` line.

mod command;
mod response;

pub use command::{parse_command, Command, SetHeader, NOREPLY};
pub use response::{write_end, write_error, write_stored, write_value, END, STORED};

/// Strips one trailing `\n` and an optional `\r` before it.
pub fn frame_line(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}
