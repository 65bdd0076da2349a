//! Connection State Machine
//!
//! Drives one client stream through the protocol. A connection alternates
//! between reading command lines and, after a `set` header, reading exactly
//! `bytes + 2` bytes of payload. Bytes are processed strictly in arrival
//! order and no shared lock is held across a network read or write.

use bytes::Bytes;
use tokio::io::{
    self, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter, ReadHalf, WriteHalf,
};
use tracing::debug;

use crate::cache::CacheEntry;
use crate::error::{CacheError, ConnectionError, ProtocolError};
use crate::protocol::{self, Command, SetHeader};
use crate::server::registry::{ConnectionId, ConnectionState};
use crate::server::ServerState;

/// Payload terminator
const TERMINATOR: &[u8] = b"\r\n";

/// Longest command line accepted, terminator included
const MAX_LINE_LENGTH: usize = 64 * 1024;

// == Connection ==
pub struct Connection<S> {
    id: ConnectionId,
    reader: BufReader<ReadHalf<S>>,
    writer: BufWriter<WriteHalf<S>>,
    state: ServerState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: ConnectionId, stream: S, state: ServerState) -> Self {
        let (read_half, write_half) = io::split(stream);
        Self {
            id,
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            state,
        }
    }

    // == Run ==
    /// Serves the connection until the client goes away.
    ///
    /// Returns `Ok(())` when the stream ends cleanly between commands. A
    /// stream cut mid-line or mid-payload, or any socket error, is returned
    /// as an error. Either way the registry entry is gone afterwards.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        self.state.connections.register(self.id).await;
        let result = self.process().await;
        self.state.connections.remove(self.id).await;
        result
    }

    async fn process(&mut self) -> Result<(), ConnectionError> {
        loop {
            let current = self
                .state
                .connections
                .state(self.id)
                .await
                .unwrap_or_default();

            match current {
                ConnectionState::Waiting => {
                    let Some(line) = self.read_line().await? else {
                        return Ok(());
                    };
                    self.handle_line(&line).await?;
                }
                ConnectionState::WaitingValue(header) => {
                    let payload = self.read_payload(header.bytes).await?;
                    self.handle_value(header, payload).await?;
                    self.set_state(ConnectionState::Waiting).await;
                }
            }

            self.writer.flush().await?;
        }
    }

    /// Reads through the next `\n`. `None` on EOF at a line boundary.
    ///
    /// A line that reaches [`MAX_LINE_LENGTH`] without a newline ends the
    /// connection.
    async fn read_line(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        let mut buf = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() != Some(&b'\n') {
            if n >= MAX_LINE_LENGTH {
                return Err(ConnectionError::LineTooLong(MAX_LINE_LENGTH));
            }
            return Err(ConnectionError::Truncated);
        }
        Ok(Some(buf))
    }

    /// Reads the payload plus its terminator.
    async fn read_payload(
        &mut self,
        declared: usize,
    ) -> Result<Result<Bytes, ProtocolError>, ConnectionError> {
        let expected = declared + TERMINATOR.len();

        // Grows with the bytes that actually arrive, not the declared size
        let mut buf = Vec::new();
        (&mut self.reader)
            .take(expected as u64)
            .read_to_end(&mut buf)
            .await?;
        if buf.len() < expected {
            return Err(ConnectionError::Truncated);
        }

        if &buf[declared..] != TERMINATOR {
            let actual = buf
                .iter()
                .rposition(|b| *b != b'\r' && *b != b'\n')
                .map_or(0, |pos| pos + 1);
            return Ok(Err(ProtocolError::BadDataChunk {
                expected: declared,
                actual,
            }));
        }

        buf.truncate(declared);
        Ok(Ok(Bytes::from(buf)))
    }

    async fn handle_line(&mut self, raw: &[u8]) -> Result<(), ConnectionError> {
        let command = std::str::from_utf8(protocol::frame_line(raw))
            .map_err(|_| ProtocolError::MalformedCommand)
            .and_then(protocol::parse_command);

        match command {
            Ok(Command::Set(header)) => {
                self.set_state(ConnectionState::WaitingValue(header)).await;
                Ok(())
            }
            Ok(Command::Get { keys }) => self.handle_get(&keys).await,
            Err(err) => self.reject(err).await,
        }
    }

    async fn handle_get(&mut self, keys: &[String]) -> Result<(), ConnectionError> {
        for key in keys {
            let lookup = {
                let mut cache = self.state.cache.write().await;
                cache.get(key)
            };

            match lookup {
                Ok(value) => {
                    protocol::write_value(&mut self.writer, key, &value).await?;
                    self.writer.flush().await?;
                }
                Err(CacheError::NotFound(_)) => {}
                Err(err) => debug!(conn = %self.id, error = %err, "Lookup failed"),
            }
        }
        protocol::write_end(&mut self.writer).await?;
        Ok(())
    }

    async fn handle_value(
        &mut self,
        header: SetHeader,
        payload: Result<Bytes, ProtocolError>,
    ) -> Result<(), ConnectionError> {
        let value = match payload {
            Ok(value) => value,
            Err(err) => return self.reject(err).await,
        };

        let entry = CacheEntry::with_metadata(value, header.flags, header.exptime);
        {
            let mut cache = self.state.cache.write().await;
            cache.upsert_entry(header.key, entry);
        }
        protocol::write_stored(&mut self.writer).await?;
        Ok(())
    }

    async fn reject(&mut self, err: ProtocolError) -> Result<(), ConnectionError> {
        debug!(conn = %self.id, error = %err, "Rejected command");
        protocol::write_error(&mut self.writer, &err).await?;
        Ok(())
    }

    async fn set_state(&self, next: ConnectionState) {
        self.state.connections.update_state(self.id, next).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use tokio_test::io::Builder;

    fn test_state() -> ServerState {
        ServerState::new(CacheStore::new(100).unwrap())
    }

    async fn run_mock(
        state: &ServerState,
        mock: tokio_test::io::Mock,
    ) -> Result<(), ConnectionError> {
        let id = state.connections.next_id();
        Connection::new(id, mock, state.clone()).run().await
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set foo 0 0 5\r\nhello\r\n")
            .write(b"STORED\r\n")
            .read(b"get foo\r\n")
            .write(b"VALUE foo 0 5\r\nhello\r\nEND\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        assert!(state.cache.read().await.contains("foo"));
        assert!(state.connections.is_empty().await);
    }

    #[tokio::test]
    async fn test_payload_in_separate_read() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set foo 0 0 5\r\n")
            .read(b"hel")
            .read(b"lo\r\n")
            .write(b"STORED\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        let value = state.cache.write().await.get("foo").unwrap();
        assert_eq!(value, Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"get nosuch\r\n")
            .write(b"END\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();
    }

    #[tokio::test]
    async fn test_multi_get_skips_misses() {
        let state = test_state();
        {
            let mut cache = state.cache.write().await;
            cache.upsert("a", "1");
            cache.upsert("c", "333");
        }
        let mock = Builder::new()
            .read(b"gets a b c\n")
            .write(b"VALUE a 0 1\r\n1\r\nVALUE c 0 3\r\n333\r\nEND\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_size_keeps_old_value() {
        let state = test_state();
        state.cache.write().await.upsert("foo", "old");
        let mock = Builder::new()
            .read(b"set foo 0 0 abc\r\n")
            .write(b"CLIENT_ERROR Invalid size\r\n")
            .read(b"get foo\r\n")
            .write(b"VALUE foo 0 3\r\nold\r\nEND\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_data_chunk_leaves_store_untouched() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set foo 0 0 3\r\nabcde")
            .write(b"CLIENT_ERROR bad data chunk\r\n")
            .read(b"get foo\r\n")
            .write(b"END\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        assert!(!state.cache.read().await.contains("foo"));
    }

    #[tokio::test]
    async fn test_payload_may_contain_crlf() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set bin 0 0 4\r\na\r\nb\r\n")
            .write(b"STORED\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        let value = state.cache.write().await.get("bin").unwrap();
        assert_eq!(value, Bytes::from_static(b"a\r\nb"));
    }

    #[tokio::test]
    async fn test_protocol_errors_keep_connection_open() {
        let state = test_state();
        let long_key = "k".repeat(251);
        let line = format!("set {} 0 0 1\r\n", long_key);
        let mock = Builder::new()
            .read(line.as_bytes())
            .write(b"CLIENT_ERROR bad command line format\r\n")
            .read(b"set foo 0 0\r\n")
            .write(b"ERROR\r\n")
            .read(b"delete foo\r\n")
            .write(b"ERROR\r\n")
            .read(b"set foo 0 0 1\r\nx\r\n")
            .write(b"STORED\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        assert!(state.cache.read().await.contains("foo"));
    }

    #[tokio::test]
    async fn test_metadata_stored_but_not_returned() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set foo 42 3600 2 noreply\r\nhi\r\n")
            .write(b"STORED\r\n")
            .read(b"get foo\r\n")
            .write(b"VALUE foo 0 2\r\nhi\r\nEND\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        let cache = state.cache.read().await;
        let entry = cache.peek("foo").unwrap();
        assert_eq!(entry.flags, 42);
        assert_eq!(entry.exptime, 3600);
    }

    #[tokio::test]
    async fn test_truncated_payload_tears_down() {
        let state = test_state();
        let mock = Builder::new().read(b"set foo 0 0 10\r\nshort").build();

        let result = run_mock(&state, mock).await;

        assert!(matches!(result, Err(ConnectionError::Truncated)));
        assert!(state.connections.is_empty().await);
        assert!(state.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_lenient_set_header_and_empty_get() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set foo abc 0 5\r\nhello\r\n")
            .write(b"STORED\r\n")
            .read(b"get\r\n")
            .write(b"END\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();

        let cache = state.cache.read().await;
        let entry = cache.peek("foo").unwrap();
        assert_eq!(entry.value, Bytes::from_static(b"hello"));
        assert_eq!(entry.flags, 0);
    }

    #[tokio::test]
    async fn test_declared_size_without_payload_tears_down() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"set big 0 0 67108864\r\n")
            .read(b"abc")
            .build();

        let result = run_mock(&state, mock).await;

        assert!(matches!(result, Err(ConnectionError::Truncated)));
        assert!(state.connections.is_empty().await);
        assert!(!state.cache.read().await.contains("big"));
    }

    #[tokio::test]
    async fn test_overlong_line_tears_down() {
        let state = test_state();
        let (mut client, server) = tokio::io::duplex(4096);
        let id = state.connections.next_id();
        let task = tokio::spawn(Connection::new(id, server, state.clone()).run());

        // The server stops reading at the cap, so the write may fail
        let line = vec![b'k'; MAX_LINE_LENGTH + 1024];
        let _ = client.write_all(&line).await;

        let result = task.await.unwrap();

        assert!(matches!(
            result,
            Err(ConnectionError::LineTooLong(MAX_LINE_LENGTH))
        ));
        assert!(state.connections.is_empty().await);
    }

    #[tokio::test]
    async fn test_line_at_cap_is_accepted() {
        let state = test_state();
        let mut line = b"get ".to_vec();
        line.resize(MAX_LINE_LENGTH - 2, b'k');
        line.extend_from_slice(b"\r\n");
        let mock = Builder::new().read(&line).write(b"END\r\n").build();

        run_mock(&state, mock).await.unwrap();
    }

    #[tokio::test]
    async fn test_truncated_line_tears_down() {
        let state = test_state();
        let mock = Builder::new().read(b"get fo").build();

        let result = run_mock(&state, mock).await;

        assert!(matches!(result, Err(ConnectionError::Truncated)));
        assert!(state.connections.is_empty().await);
    }

    #[tokio::test]
    async fn test_read_error_tears_down() {
        let state = test_state();
        let mock = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();

        let result = run_mock(&state, mock).await;

        assert!(matches!(result, Err(ConnectionError::Io(_))));
        assert!(state.connections.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_error() {
        let state = test_state();
        let mock = Builder::new()
            .read(b"get \xff\xfe\r\n")
            .write(b"ERROR\r\n")
            .build();

        run_mock(&state, mock).await.unwrap();
    }
}
