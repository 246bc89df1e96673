//! mkvmerge execution.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::JobLogger;
use crate::process::{run_captured, ProcessError, ToolCommand};

/// Error from the mux stage.
#[derive(Error, Debug)]
pub enum MuxError {
    /// The muxer could not be run or timed out.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The muxer exited non-zero, warnings included.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// I/O error around the muxer.
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The muxer reported success but produced no file.
    #[error("Output file not created: {0}")]
    OutputMissing(PathBuf),
}

impl MuxError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Process(e) if e.is_timeout())
    }
}

/// Output from the mux stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuxOutput {
    /// Path to final merged file.
    pub output_path: PathBuf,
    /// mkvmerge exit code.
    pub exit_code: i32,
    /// mkvmerge command that was run.
    pub command: String,
}

/// Runs mkvmerge with prepared tokens.
#[derive(Debug, Clone)]
pub struct Muxer {
    command: ToolCommand,
    timeout: Option<Duration>,
}

impl Muxer {
    pub fn new(command: ToolCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    /// Run the muxer writing `output_path`.
    ///
    /// Only exit 0 counts as success. mkvmerge exits 1 on warnings and 2 on
    /// errors; both fail the clip with the reported text.
    pub fn mux(
        &self,
        tokens: &[String],
        output_path: &Path,
        logger: &JobLogger,
    ) -> Result<MuxOutput, MuxError> {
        let tool = self.command.name();
        let command = self.command.display_with(tokens);
        logger.command(&command);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|source| MuxError::Io {
                operation: "creating output directory".to_string(),
                source,
            })?;
        }

        let mut cmd = self.command.command();
        cmd.args(tokens);
        let result = run_captured(&tool, &mut cmd, self.timeout)?;

        for line in result.stdout_lossy().lines() {
            logger.output_line(line, false);
        }
        for line in result.stderr_lossy().lines() {
            logger.output_line(line, true);
        }

        let exit_code = result.exit_code();
        if exit_code != 0 {
            logger.show_tail(&tool);
            // mkvmerge prints warnings and most errors on stdout.
            let message = [result.stdout_lossy(), result.stderr_lossy()]
                .iter()
                .map(|text| text.trim())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(MuxError::Failed {
                tool,
                exit_code,
                message,
            });
        }

        if !output_path.exists() {
            return Err(MuxError::OutputMissing(output_path.to_path_buf()));
        }

        Ok(MuxOutput {
            output_path: output_path.to_path_buf(),
            exit_code,
            command,
        })
    }
}
