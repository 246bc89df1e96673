//! Tool command and process error types.

use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error from launching or supervising an external process.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// I/O with a running process failed.
    #[error("I/O error while {operation} ({tool}): {source}")]
    Io {
        tool: String,
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The process exceeded its deadline and was killed.
    #[error("{tool} timed out after {secs}s and was terminated")]
    Timeout { tool: String, secs: u64 },
}

impl ProcessError {
    /// Create an I/O error with context.
    pub fn io(tool: impl Into<String>, operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            tool: tool.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Check if this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Convert a seconds setting into an optional deadline (0 = unbounded).
pub fn limit_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// An external program plus leading arguments.
///
/// The leading arguments come before anything the caller appends, so a tool
/// can be wrapped (e.g. `program = "nice"`, `args = ["-n", "10", "x265"]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Program name or path.
    pub program: PathBuf,
    /// Arguments inserted before the call-specific arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Create a tool command with no leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add leading arguments (builder pattern).
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Resolve a bare program name against `PATH`.
    ///
    /// Explicit paths are kept as-is. If the lookup fails the name is kept,
    /// and launching will report the failure.
    pub fn resolved(&self) -> Self {
        if self.program.components().count() != 1 {
            return self.clone();
        }
        match which::which(&self.program) {
            Ok(path) => Self {
                program: path,
                args: self.args.clone(),
            },
            Err(e) => {
                tracing::debug!("Could not resolve {} in PATH: {}", self.program.display(), e);
                self.clone()
            }
        }
    }

    /// Short tool name for logs and errors (file name of the program).
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Build a `Command` with the leading arguments applied.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Render the full command line for logging.
    pub fn display_with(&self, extra: &[String]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.extend(extra.iter().cloned());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_secs_means_unbounded() {
        assert_eq!(limit_from_secs(0), None);
        assert_eq!(limit_from_secs(5), Some(Duration::from_secs(5)));
    }

    #[test]
    fn display_includes_leading_args() {
        let tool = ToolCommand::new("nice").with_args(["-n", "10", "x265"]);
        let line = tool.display_with(&["--frames".to_string(), "10".to_string()]);
        assert_eq!(line, "nice -n 10 x265 --frames 10");
    }

    #[test]
    fn explicit_path_is_not_resolved() {
        let tool = ToolCommand::new("/opt/tools/mkvmerge");
        assert_eq!(tool.resolved(), tool);
        assert_eq!(tool.name(), "mkvmerge");
    }

    #[test]
    fn timeout_error_displays_tool() {
        let err = ProcessError::Timeout {
            tool: "x265".to_string(),
            secs: 30,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("x265"));
        assert!(err.to_string().contains("30s"));
    }
}
