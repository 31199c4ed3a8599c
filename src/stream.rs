//! Stream channel: a continuous sequence of length-prefixed frames with
//! single-frame-in-flight flow control.
//!
//! The producer (agent) writes one frame, then blocks on a one-item
//! acknowledgment read before the next frame goes out. Any single-byte
//! acknowledgment continues the stream; an acknowledgment containing the
//! sentinel aborts it. The consumer (console) reads frames, presents them
//! through a [`FrameSink`], and acknowledges one-for-one.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::capability::FrameSource;
use crate::errors::{CapabilityError, TransportError};
use crate::transport::frame::{recv_frame, send_frame};
use crate::transport::SENTINEL;

/// Acknowledgment-to-continue byte sent by the consumer after each frame.
pub const ACK: &[u8] = b".";

/// What the consumer should do after presenting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkVerdict {
    /// Acknowledge and keep receiving.
    Continue,
    /// Send the termination sentinel and close the channel.
    Stop,
}

/// Consumes decoded frames on the console side.
///
/// A failed `present` is logged and the frame skipped; the channel stays up
/// (best-effort live view).
#[async_trait]
pub trait FrameSink: Send {
    async fn present(&mut self, frame: &[u8]) -> Result<SinkVerdict, CapabilityError>;
}

/// Drive the producer side until the consumer terminates the stream, the
/// source fails, or the connection drops. Returns the number of frames sent.
///
/// The capture device is owned by `source`; the caller drops it (releasing
/// the device) when this returns, on every path.
pub async fn produce<C>(
    conn: &mut C,
    source: &mut dyn FrameSource,
    max_frame_bytes: u32,
) -> u64
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut sent: u64 = 0;
    let mut ack = [0u8; 64];

    info!("Starting frame stream");
    loop {
        let frame = match source.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Frame source failed, stopping stream");
                break;
            }
        };

        if let Err(e) = send_frame(conn, &frame, max_frame_bytes).await {
            warn!(error = %e, "Stream write failed, stopping stream");
            break;
        }
        sent += 1;

        // Flow control: block until the consumer acknowledges this frame.
        let n = match conn.read(&mut ack).await {
            Ok(0) => {
                debug!("Stream consumer closed the connection");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Stream ack read failed, stopping stream");
                break;
            }
        };

        if contains_sentinel(&ack[..n]) {
            info!(frames = sent, "Stream terminated by consumer");
            break;
        }
    }

    info!(frames = sent, "Frame stream stopped");
    sent
}

/// Drive the consumer side until the sink asks to stop or the producer goes
/// away. Returns the number of frames received.
pub async fn consume<C>(
    conn: &mut C,
    sink: &mut dyn FrameSink,
    max_frame_bytes: u32,
) -> Result<u64, TransportError>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    let mut received: u64 = 0;

    loop {
        let frame = match recv_frame(conn, max_frame_bytes).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Stream producer closed the connection");
                break;
            }
            Err(e) if e.is_protocol_violation() => {
                // Best-effort: a malformed frame ends the channel, not the session
                warn!(error = %e, "Malformed stream frame, closing channel");
                break;
            }
            Err(e) => return Err(e),
        };
        received += 1;

        let verdict = match sink.present(&frame).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(error = %e, frame = received, "Frame presentation failed, skipping");
                SinkVerdict::Continue
            }
        };

        match verdict {
            SinkVerdict::Continue => {
                conn.write_all(ACK).await?;
                conn.flush().await?;
            }
            SinkVerdict::Stop => {
                conn.write_all(SENTINEL).await?;
                conn.flush().await?;
                info!(frames = received, "Requested stream termination");
                break;
            }
        }
    }

    Ok(received)
}

fn contains_sentinel(bytes: &[u8]) -> bool {
    bytes
        .windows(SENTINEL.len())
        .any(|window| window == SENTINEL)
}

/// Shipped sink: spools each frame to a numbered file in a directory and
/// stops when the operator flips the quit signal.
pub struct SpoolSink {
    dir: PathBuf,
    next_index: u64,
    quit: watch::Receiver<bool>,
}

impl SpoolSink {
    /// Create a sink writing into `dir` (created if absent), stopping when
    /// `quit` becomes true.
    pub async fn new(dir: PathBuf, quit: watch::Receiver<bool>) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            next_index: 0,
            quit,
        })
    }
}

#[async_trait]
impl FrameSink for SpoolSink {
    async fn present(&mut self, frame: &[u8]) -> Result<SinkVerdict, CapabilityError> {
        if *self.quit.borrow() {
            return Ok(SinkVerdict::Stop);
        }
        let path = self.dir.join(format!("frame-{:06}.jpg", self.next_index));
        tokio::fs::write(&path, frame)
            .await
            .map_err(|e| CapabilityError::new(e.to_string()))?;
        self.next_index += 1;
        Ok(SinkVerdict::Continue)
    }
}
