//! Length-prefixed frame codec for the stream channel.
//!
//! Format: [4-byte big-endian length][payload bytes]. Frames are totally
//! ordered within a channel and carry no identifier.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::TransportError;

/// Write one frame to a writer.
pub async fn send_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    max_bytes: u32,
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge {
        got: u32::MAX,
        max: max_bytes,
    })?;
    if len > max_bytes {
        return Err(TransportError::FrameTooLarge {
            got: len,
            max: max_bytes,
        });
    }

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame from a reader. Enforces `max_bytes`.
///
/// Returns `Ok(None)` when the peer closes cleanly before a header byte.
/// Closing mid-header or mid-payload is a protocol violation
/// (`TruncatedFrame`).
pub async fn recv_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_bytes: u32,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::TruncatedFrame);
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header);
    if len > max_bytes {
        return Err(TransportError::FrameTooLarge {
            got: len,
            max: max_bytes,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::TruncatedFrame
        } else {
            TransportError::Io(e)
        }
    })?;
    Ok(Some(payload))
}
