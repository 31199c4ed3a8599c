//! Framed transport over an ordered byte stream.
//!
//! Command direction: raw UTF-8 text, one command per message. Response
//! direction: raw bytes terminated by the `DONE` sentinel, written exactly
//! once after all payload bytes. The stream channel uses length-prefixed
//! frames instead; see [`frame`].
//!
//! Any i/o failure here means the connection is no longer usable.

pub mod frame;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::TransportError;

/// Reserved byte sequence marking payload completion on the command channel.
///
/// A literal marker is fragile for binary payloads that may contain it; the
/// cap-and-scan receive below is the documented trade-off of this wire shape.
pub const SENTINEL: &[u8] = b"DONE";

/// How a sentinel-terminated receive ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEnd {
    /// The sentinel was seen; it is stripped from the returned bytes.
    Sentinel,
    /// The peer closed the connection before any sentinel.
    PeerClosed,
    /// `max_bytes` was reached; the payload is truncated.
    Capped,
}

/// Result of [`recv_until_sentinel`].
#[derive(Debug)]
pub struct SentinelPayload {
    /// Accumulated bytes, excluding the sentinel.
    pub bytes: Vec<u8>,
    /// Why accumulation stopped.
    pub end: PayloadEnd,
}

impl SentinelPayload {
    /// Whether the payload arrived complete (terminated by its sentinel).
    pub const fn is_complete(&self) -> bool {
        matches!(self.end, PayloadEnd::Sentinel)
    }
}

/// Write a command as raw UTF-8, no framing.
pub async fn send_text<W: AsyncWrite + Unpin>(
    writer: &mut W,
    text: &str,
) -> Result<(), TransportError> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Stream a payload from `reader` in `chunk_size` increments, then write the
/// sentinel as a final, distinct write. Large payloads are never buffered
/// whole. Returns the number of payload bytes sent (sentinel excluded).
pub async fn send_sentinel_terminated<W, R>(
    writer: &mut W,
    reader: &mut R,
    chunk_size: usize,
) -> Result<u64, TransportError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut chunk = vec![0u8; chunk_size.max(1)];
    let mut sent: u64 = 0;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&chunk[..n]).await?;
        sent += n as u64;
    }

    writer.write_all(SENTINEL).await?;
    writer.flush().await?;
    Ok(sent)
}

/// Accumulate bytes in `buffer_size` increments until the sentinel appears,
/// the peer closes, or `max_bytes` is reached. The sentinel search spans
/// chunk boundaries. Everything up to and excluding the sentinel is returned;
/// anything after it is discarded.
pub async fn recv_until_sentinel<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
    buffer_size: usize,
) -> Result<SentinelPayload, TransportError> {
    let mut data: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; buffer_size.max(1)];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(SentinelPayload {
                bytes: data,
                end: PayloadEnd::PeerClosed,
            });
        }
        data.extend_from_slice(&chunk[..n]);

        // Only the tail can contain a newly completed sentinel: the last
        // chunk plus up to SENTINEL.len()-1 bytes carried over before it.
        let window = data.len().saturating_sub(n + SENTINEL.len() - 1);
        if let Some(offset) = find_sentinel(&data[window..]) {
            data.truncate(window + offset);
            return Ok(SentinelPayload {
                bytes: data,
                end: PayloadEnd::Sentinel,
            });
        }

        if data.len() >= max_bytes {
            data.truncate(max_bytes);
            return Ok(SentinelPayload {
                bytes: data,
                end: PayloadEnd::Capped,
            });
        }
    }
}

fn find_sentinel(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(SENTINEL.len())
        .position(|window| window == SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn wire_for(payload: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        let mut source = Cursor::new(payload.to_vec());
        send_sentinel_terminated(&mut wire, &mut source, 7)
            .await
            .unwrap();
        wire
    }

    #[tokio::test]
    async fn roundtrip_sentinel_framing() {
        let payload = b"the quick brown fox jumps over the lazy dog";
        let wire = wire_for(payload).await;
        assert!(wire.ends_with(SENTINEL));

        let mut cursor = Cursor::new(wire);
        let received = recv_until_sentinel(&mut cursor, 1024, 16).await.unwrap();
        assert_eq!(received.bytes, payload);
        assert_eq!(received.end, PayloadEnd::Sentinel);
        assert!(received.is_complete());
    }

    #[tokio::test]
    async fn empty_payload() {
        let wire = wire_for(b"").await;
        assert_eq!(wire, SENTINEL);

        let mut cursor = Cursor::new(wire);
        let received = recv_until_sentinel(&mut cursor, 1024, 16).await.unwrap();
        assert!(received.bytes.is_empty());
        assert!(received.is_complete());
    }

    #[tokio::test]
    async fn sentinel_split_across_read_boundaries() {
        // A 2-byte read increment forces the sentinel to straddle chunks.
        let wire = wire_for(b"abc").await;
        let mut cursor = Cursor::new(wire);
        let received = recv_until_sentinel(&mut cursor, 1024, 2).await.unwrap();
        assert_eq!(received.bytes, b"abc");
        assert!(received.is_complete());
    }

    #[tokio::test]
    async fn peer_close_returns_partial() {
        let mut cursor = Cursor::new(b"partial response".to_vec());
        let received = recv_until_sentinel(&mut cursor, 1024, 16).await.unwrap();
        assert_eq!(received.bytes, b"partial response");
        assert_eq!(received.end, PayloadEnd::PeerClosed);
        assert!(!received.is_complete());
    }

    #[tokio::test]
    async fn oversize_payload_is_capped() {
        let mut big = vec![b'x'; 100];
        big.extend_from_slice(SENTINEL);
        let mut cursor = Cursor::new(big);

        let received = recv_until_sentinel(&mut cursor, 32, 8).await.unwrap();
        assert_eq!(received.bytes.len(), 32);
        assert_eq!(received.end, PayloadEnd::Capped);
    }

    #[tokio::test]
    async fn bytes_after_sentinel_are_discarded() {
        let mut wire = b"hello".to_vec();
        wire.extend_from_slice(SENTINEL);
        wire.extend_from_slice(b"trailing junk");

        let mut cursor = Cursor::new(wire);
        let received = recv_until_sentinel(&mut cursor, 1024, 64).await.unwrap();
        assert_eq!(received.bytes, b"hello");
        assert!(received.is_complete());
    }

    #[tokio::test]
    async fn send_text_is_unframed() {
        let mut wire = Vec::new();
        send_text(&mut wire, "ls -la").await.unwrap();
        assert_eq!(wire, b"ls -la");
    }
}
