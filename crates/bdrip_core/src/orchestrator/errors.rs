//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Operation → Detail

use std::io;

use thiserror::Error;

use crate::encode::EncodeError;
use crate::mux::MuxError;
use crate::probe::ProbeError;
use crate::process::ProcessError;
use crate::transform::TransformError;

/// Top-level pipeline error with job context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Pipeline was cancelled.
    #[error("Job '{job_name}' was cancelled")]
    Cancelled { job_name: String },

    /// Failed to set up job (create directories, locate the source, etc.).
    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(job_name: impl Into<String>) -> Self {
        Self::Cancelled {
            job_name: job_name.into(),
        }
    }

    /// The failing step's error, if a step failed.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Error class for reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StepFailed { source, .. } => source.kind(),
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::SetupFailed { .. } => ErrorKind::Io,
        }
    }
}

/// Class of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Probe,
    Transform,
    Encode,
    Mux,
    Timeout,
    Io,
    Validation,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Transform => "transform",
            Self::Encode => "encode",
            Self::Mux => "mux",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Validation => "validation",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from a pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    /// The prober failed in a way that stops the job.
    #[error("Probe failed: {0}")]
    Probe(#[source] ProbeError),

    /// The user transform failed.
    #[error("Transform failed: {0}")]
    Transform(#[source] TransformError),

    /// The encoder failed.
    #[error("Encode failed: {0}")]
    Encode(#[source] EncodeError),

    /// The muxer failed.
    #[error("Mux failed: {0}")]
    Mux(#[source] MuxError),

    /// An external process exceeded its deadline and was terminated.
    #[error("{0}")]
    Timeout(#[source] ProcessError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Error class for reports.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Probe(_) => ErrorKind::Probe,
            Self::Transform(_) => ErrorKind::Transform,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Mux(_) => ErrorKind::Mux,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::IoError { .. } => ErrorKind::Io,
            Self::InvalidInput(_) | Self::InvalidOutput(_) => ErrorKind::Validation,
        }
    }
}

impl From<ProbeError> for StepError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Process(p) if p.is_timeout() => Self::Timeout(p),
            other => Self::Probe(other),
        }
    }
}

impl From<TransformError> for StepError {
    fn from(e: TransformError) -> Self {
        match e {
            TransformError::Process(p) if p.is_timeout() => Self::Timeout(p),
            other => Self::Transform(other),
        }
    }
}

impl From<EncodeError> for StepError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::Process(p) if p.is_timeout() => Self::Timeout(p),
            // A frame source failing mid-stream is the transform's fault.
            EncodeError::Transform(t) => t.into(),
            EncodeError::Io { operation, source } => Self::io_error(operation, source),
            other => Self::Encode(other),
        }
    }
}

impl From<MuxError> for StepError {
    fn from(e: MuxError) -> Self {
        match e {
            MuxError::Process(p) if p.is_timeout() => Self::Timeout(p),
            MuxError::Io { operation, source } => Self::io_error(operation, source),
            other => Self::Mux(other),
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> ProcessError {
        ProcessError::Timeout {
            tool: "x265".to_string(),
            secs: 30,
        }
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::from(MuxError::Failed {
            tool: "mkvmerge".to_string(),
            exit_code: 2,
            message: "Invalid track ID".to_string(),
        });
        let pipeline_err = PipelineError::step_failed("00001", "Mux", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("00001"));
        assert!(msg.contains("Mux"));
        assert!(msg.contains("exit code 2"));
        assert_eq!(pipeline_err.kind(), ErrorKind::Mux);
        assert!(matches!(pipeline_err.step_error(), Some(StepError::Mux(_))));
        assert!(PipelineError::cancelled("00001").step_error().is_none());
    }

    #[test]
    fn filesystem_failures_are_io() {
        let err = MuxError::Io {
            operation: "creating output directory".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(StepError::from(err).kind(), ErrorKind::Io);
        assert_eq!(
            StepError::from(EncodeError::io("writing frames", io::Error::other("disk full")))
                .kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn timeouts_are_their_own_class() {
        assert_eq!(StepError::from(EncodeError::Process(timeout())).kind(), ErrorKind::Timeout);
        assert_eq!(StepError::from(MuxError::Process(timeout())).kind(), ErrorKind::Timeout);
        assert_eq!(StepError::from(ProbeError::Process(timeout())).kind(), ErrorKind::Timeout);

        let spawn = ProcessError::Spawn {
            tool: "x265".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(StepError::from(EncodeError::Process(spawn)).kind(), ErrorKind::Encode);
    }

    #[test]
    fn stream_failure_is_transform_error() {
        let err = EncodeError::Transform(TransformError::Stream("ended early".to_string()));
        assert_eq!(StepError::from(err).kind(), ErrorKind::Transform);

        let err = EncodeError::Transform(TransformError::Process(timeout()));
        assert_eq!(StepError::from(err).kind(), ErrorKind::Timeout);
    }
}
