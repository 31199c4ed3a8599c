//! Bounded-retry connection establishment with fixed backoff.
//!
//! Used only by the agent at startup; the console binds and waits passively.
//! Exhausting the attempts is a fatal startup failure, not a recoverable
//! session error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ReconnectConfig;

/// Fixed-backoff retry policy.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `connect` up to `max_attempts` times, sleeping the fixed delay
    /// after each failure except the last. Returns the last error on
    /// exhaustion.
    pub async fn establish<T, E, F, Fut>(&self, mut connect: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match connect().await {
                Ok(conn) => {
                    info!(attempt, "Connection established");
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "Connection attempt failed");
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }
}
