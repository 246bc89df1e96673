//! Encode result and error types.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::ProcessError;
use crate::transform::TransformError;

/// Output from a finished encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOutput {
    /// Encoded elementary stream.
    pub path: PathBuf,
    /// Frames written to the encoder.
    pub frames_written: u64,
    /// Encoder exit code.
    pub exit_code: i32,
    /// Encoder command that was run.
    pub command: String,
}

/// Error from the encode stage.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The encoder could not be run or timed out.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The encoder exited with an error.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The frame sequence yielded a different number of frames than reported.
    #[error("Frame count mismatch: stream reported {expected} frames, transform yielded {actual}")]
    FrameMismatch { expected: u64, actual: u64 },

    /// A frame's byte length does not match the reported format.
    #[error("Frame {index} is {actual} bytes, expected {expected}")]
    FrameSize {
        index: u64,
        expected: usize,
        actual: usize,
    },

    /// The transform failed while frames were being streamed.
    #[error("Transform failed during encode: {0}")]
    Transform(#[source] TransformError),

    /// The encoder stopped reading before all frames were written.
    #[error("{tool} closed its input after {written} frames")]
    InputClosed { tool: String, written: u64 },

    /// I/O error around the encoder.
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The encoder reported success but produced no file.
    #[error("Encoder output not created: {0}")]
    OutputMissing(PathBuf),

    /// Parameters could not be derived from the stream metadata.
    #[error("Invalid encode parameters: {0}")]
    InvalidParams(String),
}

impl EncodeError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Process(e) if e.is_timeout())
    }
}
