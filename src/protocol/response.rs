//! Response Writers
//!
//! Serializes replies in the memcached text format. Every writer appends to
//! the stream; callers flush once the reply for a command is complete.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

pub const STORED: &[u8] = b"STORED\r\n";
pub const END: &[u8] = b"END\r\n";
pub const CRLF: &[u8] = b"\r\n";

/// Writes one `VALUE <key> 0 <len>` block.
///
/// Flags are always reported as `0`.
pub async fn write_value<W>(writer: &mut W, key: &str, value: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("VALUE {} 0 {}\r\n", key, value.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(value).await?;
    writer.write_all(CRLF).await
}

pub async fn write_end<W: AsyncWrite + Unpin>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(END).await
}

pub async fn write_stored<W: AsyncWrite + Unpin>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(STORED).await
}

pub async fn write_error<W>(writer: &mut W, err: &ProtocolError) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(err.reply()).await
}
