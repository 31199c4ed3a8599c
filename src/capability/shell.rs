//! System shell executor.
//!
//! Runs one command line via the platform shell, bounded by a fixed timeout.
//! Output is stdout concatenated with stderr, lossily decoded.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::Shell;
use crate::errors::CapabilityError;

/// Shell collaborator backed by `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct SystemShell {
    timeout: Duration,
}

impl SystemShell {
    /// Create a shell executor with the given per-command timeout.
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[cfg(unix)]
    fn command(line: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(line);
        cmd
    }

    #[cfg(windows)]
    fn command(line: &str) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    }
}

#[async_trait]
impl Shell for SystemShell {
    async fn run(&self, command: &str, cwd: &Path) -> Result<String, CapabilityError> {
        debug!(command_len = command.len(), cwd = %cwd.display(), "Running shell command");

        let mut child = Self::command(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CapabilityError::new(e.to_string()))?;

        // Take pipe handles out so `child` stays in scope for kill-on-timeout
        let mut child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| CapabilityError::new("Failed to open stdout"))?;
        let mut child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| CapabilityError::new("Failed to open stderr"))?;

        // One timeout over reading AND waiting: a child that closes its
        // output descriptors but keeps running must still hit the bound.
        let run_to_completion = async {
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            let (r1, r2) = tokio::join!(
                child_stdout.read_to_end(&mut stdout_buf),
                child_stderr.read_to_end(&mut stderr_buf),
            );
            r1.map_err(|e| CapabilityError::new(e.to_string()))?;
            r2.map_err(|e| CapabilityError::new(e.to_string()))?;
            let status = child
                .wait()
                .await
                .map_err(|e| CapabilityError::new(e.to_string()))?;
            Ok::<_, CapabilityError>((stdout_buf, stderr_buf, status))
        };

        let (stdout_buf, stderr_buf, status) =
            if let Ok(result) = tokio::time::timeout(self.timeout, run_to_completion).await {
                result?
            } else {
                let _ = child.kill().await;
                return Err(CapabilityError::new("Command timed out"));
            };

        debug!(exit_code = status.code().unwrap_or(-1), "Shell command completed");

        let mut output = String::from_utf8_lossy(&stdout_buf).into_owned();
        output.push_str(&String::from_utf8_lossy(&stderr_buf));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell() -> SystemShell {
        SystemShell::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = shell().run("echo hello", Path::new("/")).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn combines_stdout_then_stderr() {
        let out = shell()
            .run("echo out; echo err 1>&2", Path::new("/"))
            .await
            .unwrap();
        assert_eq!(out, "out\nerr\n");
    }

    #[tokio::test]
    async fn runs_in_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = shell().run("pwd", dir.path()).await.unwrap();
        let reported = std::path::Path::new(out.trim());
        // Compare canonicalized: tempdirs may sit behind symlinks
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn times_out() {
        let shell = SystemShell::new(Duration::from_millis(100));
        let err = shell.run("sleep 10", Path::new("/")).await.unwrap_err();
        assert_eq!(err.to_string(), "Command timed out");
    }

    #[tokio::test]
    async fn times_out_when_child_closes_output_but_keeps_running() {
        // Closed descriptors end the reads immediately; the timeout must
        // still bound the wait on the lingering child.
        let shell = SystemShell::new(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = shell
            .run("exec >&- 2>&-; sleep 5", Path::new("/"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Command timed out");
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "timeout did not bound the child's lifetime"
        );
    }
}
