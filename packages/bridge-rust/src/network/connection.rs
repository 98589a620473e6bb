//! Reading a single reply document from an accepted connection.
//!
//! The peer writes one JSON document and may or may not close its side
//! afterwards. Bytes are buffered until they parse as a complete [`Reply`]
//! or the peer closes, bounded by the configured size and time limits.

use std::io;

use airdb_core::Reply;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::config::ConnectionConfig;

const READ_CHUNK: usize = 4096;

/// Why a connection did not yield a reply.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("connection read failed: {0}")]
    Io(#[from] io::Error),
    #[error("reply exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("reply not received within {timeout_ms}ms")]
    TimedOut { timeout_ms: u128 },
    #[error("connection closed without sending a reply")]
    Empty,
    #[error("malformed reply: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Reads one reply from `reader` within the limits of `config`.
///
/// # Errors
///
/// Returns [`ReadError`] if the peer sends invalid or oversized data, closes
/// before sending anything, stalls past the read timeout, or the socket fails.
pub async fn read_reply<R>(reader: &mut R, config: &ConnectionConfig) -> Result<Reply, ReadError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(config.read_timeout, buffer_reply(reader, config.max_message_bytes))
        .await
    {
        Ok(result) => result,
        Err(_elapsed) => Err(ReadError::TimedOut {
            timeout_ms: config.read_timeout.as_millis(),
        }),
    }
}

async fn buffer_reply<R>(reader: &mut R, limit: usize) -> Result<Reply, ReadError>
where
    R: AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if buf.iter().all(u8::is_ascii_whitespace) {
                return Err(ReadError::Empty);
            }
            return Reply::from_slice(&buf).map_err(ReadError::Malformed);
        }

        if buf.len() + n > limit {
            return Err(ReadError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk[..n]);

        match Reply::from_slice(&buf) {
            Ok(reply) => return Ok(reply),
            // Document not finished yet; keep reading.
            Err(e) if e.is_eof() => {}
            Err(e) => return Err(ReadError::Malformed(e)),
        }
    }
}
