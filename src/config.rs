//! Runtime configuration.
//!
//! Every field has a serde default so a partial (or absent) config file is
//! fine. The console binds `listen_host`; the agent dials `connect_host`.
//! CLI flags override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration, shared by both roles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the console listens on.
    pub listen_host: String,

    /// Address the agent connects to.
    pub connect_host: String,

    /// Command channel port.
    pub port: u16,

    /// Stream channel port (distinct from the command port).
    pub stream_port: u16,

    /// Read increment for sentinel accumulation and file chunking.
    pub buffer_size: usize,

    /// Cap on an accumulated command-channel response, in bytes.
    pub max_response_bytes: usize,

    /// Cap on a single stream frame, in bytes.
    pub max_frame_bytes: u32,

    /// Shell command timeout in seconds.
    pub shell_timeout_seconds: u64,

    /// Where the console saves downloaded files and captures.
    pub download_dir: std::path::PathBuf,

    /// Connection retry policy (agent startup only).
    pub reconnect: ReconnectConfig,
}

/// Bounded-retry connection establishment parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Maximum connection attempts before giving up.
    pub max_attempts: u32,

    /// Fixed delay between attempts, in seconds.
    pub delay_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            connect_host: "127.0.0.1".to_string(),
            port: 444,
            stream_port: 4444,
            buffer_size: 4096,
            max_response_bytes: 1024 * 1024,
            max_frame_bytes: 64 * 1024 * 1024,
            shell_timeout_seconds: 30,
            download_dir: std::path::PathBuf::from("."),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_seconds: 5,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Shell timeout as a `Duration`.
    pub const fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_seconds)
    }

    /// `host:port` for the command channel, using the role's host field.
    pub fn command_addr(&self, host: &str) -> String {
        format!("{host}:{}", self.port)
    }

    /// `host:port` for the stream channel, using the role's host field.
    pub fn stream_addr(&self, host: &str) -> String {
        format!("{host}:{}", self.stream_port)
    }
}

impl ReconnectConfig {
    /// Fixed inter-attempt delay as a `Duration`.
    pub const fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 444);
        assert_eq!(config.stream_port, 4444);
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.max_response_bytes, 1024 * 1024);
        assert_eq!(config.shell_timeout(), Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.reconnect.delay(), Duration::from_secs(5));
    }

    #[test]
    fn parse_partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"port": 9000, "connect_host": "10.0.0.1"}"#).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.connect_host, "10.0.0.1");
        // Everything else keeps its default
        assert_eq!(config.stream_port, 4444);
        assert_eq!(config.reconnect.max_attempts, 10);
    }

    #[test]
    fn parse_nested_reconnect() {
        let config: Config =
            serde_json::from_str(r#"{"reconnect": {"max_attempts": 3}}"#).unwrap();
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.reconnect.delay_seconds, 5);
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remlink.json");
        std::fs::write(&path, r#"{"stream_port": 5555}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.stream_port, 5555);
        assert_eq!(config.port, 444);
    }

    #[test]
    fn from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/remlink.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn addr_formatting() {
        let config = Config::default();
        assert_eq!(config.command_addr("10.1.2.3"), "10.1.2.3:444");
        assert_eq!(config.stream_addr("10.1.2.3"), "10.1.2.3:4444");
    }
}
