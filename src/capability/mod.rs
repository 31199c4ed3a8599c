//! Capability collaborator traits.
//!
//! Capabilities are opaque, fallible "produce bytes or fail" services. The
//! session layer never crashes on a capability failure; the executor converts
//! every failure into a textual `ERROR: ...` result.

mod shell;

pub mod executor;

pub use shell::SystemShell;

use async_trait::async_trait;

use crate::errors::CapabilityError;

/// Runs text as a shell command with a fixed timeout and returns the
/// combined stdout+stderr.
#[async_trait]
pub trait Shell: Send + Sync {
    async fn run(&self, command: &str, cwd: &std::path::Path) -> Result<String, CapabilityError>;
}

/// Still-image capture: full display or one camera frame, encoded bytes out.
#[async_trait]
pub trait Capture: Send + Sync {
    /// Grab the full display as an encoded image.
    async fn screenshot(&self) -> Result<Vec<u8>, CapabilityError>;

    /// Grab one frame from the first available camera device.
    async fn camera_still(&self) -> Result<Vec<u8>, CapabilityError>;

    /// Open the camera for continuous frames. The device stays exclusively
    /// owned by the returned source and is released when it is dropped.
    async fn open_camera(&self) -> Result<Box<dyn FrameSource>, CapabilityError>;
}

/// A continuous source of encoded frames (an open capture device).
#[async_trait]
pub trait FrameSource: Send {
    /// Produce the next encoded frame.
    async fn next_frame(&mut self) -> Result<Vec<u8>, CapabilityError>;
}

/// Capture collaborator for hosts without any capture integration.
///
/// Every call fails, which the executor renders as the corresponding
/// `ERROR:` result. Deployments wire a real device behind [`Capture`].
#[derive(Debug, Default, Clone)]
pub struct NoCapture;

#[async_trait]
impl Capture for NoCapture {
    async fn screenshot(&self) -> Result<Vec<u8>, CapabilityError> {
        Err(CapabilityError::new("no display capture device available"))
    }

    async fn camera_still(&self) -> Result<Vec<u8>, CapabilityError> {
        Err(CapabilityError::new("no camera device available"))
    }

    async fn open_camera(&self) -> Result<Box<dyn FrameSource>, CapabilityError> {
        Err(CapabilityError::new("no camera device available"))
    }
}
