//! Error taxonomy for the link.
//!
//! `TransportError` means the connection it occurred on is no longer usable.
//! `CapabilityError` means a single command's execution failed; it is
//! converted to a textual `ERROR: ...` result and the session stays alive.

use thiserror::Error;

/// Failure on a connection. The connection must be treated as dead.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Read or write on the underlying stream failed.
    #[error("connection i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A length-prefixed frame declared a size above the configured limit.
    #[error("frame length {got} exceeds limit {max}")]
    FrameTooLarge { got: u32, max: u32 },

    /// The peer closed the connection in the middle of a frame.
    #[error("truncated frame: peer closed mid-frame")]
    TruncatedFrame,
}

impl TransportError {
    /// Whether this is a protocol violation (malformed frame) rather than
    /// a plain i/o failure. The stream channel drops the channel on these;
    /// the command channel aborts the exchange.
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. } | Self::TruncatedFrame)
    }
}

/// Failure of a single capability invocation (shell, capture, filesystem).
///
/// Never fatal to the session: the executor renders it as `ERROR: <message>`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapabilityError {
    message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
