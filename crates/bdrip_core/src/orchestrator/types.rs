//! Core types for the orchestrator pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encode::EncodeOutput;
use crate::logging::JobLogger;
use crate::mux::MuxOutput;
use crate::probe::StreamDescriptor;
use crate::ClipId;

/// Read-only context passed to pipeline steps.
///
/// Contains everything a step needs to know about the clip being ripped.
/// Mutable state goes in `JobState`.
pub struct Context {
    /// Clip being processed (also the job name).
    pub job_name: ClipId,
    /// Source container of the clip.
    pub source_path: PathBuf,
    /// The clip's private work directory.
    pub work_dir: PathBuf,
    /// Final output file.
    pub output_path: PathBuf,
    /// Chapter file for the clip, if the playlists provided one.
    pub chapters_file: Option<PathBuf>,
    /// Per-clip logger.
    pub logger: Arc<JobLogger>,
}

impl Context {
    pub fn new(
        job_name: impl Into<ClipId>,
        source_path: PathBuf,
        work_dir: PathBuf,
        output_path: PathBuf,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            source_path,
            work_dir,
            output_path,
            chapters_file: None,
            logger,
        }
    }

    /// Set the chapter file (builder pattern).
    pub fn with_chapters(mut self, chapters_file: Option<PathBuf>) -> Self {
        self.chapters_file = chapters_file;
        self
    }

    /// Chapter file as a path reference.
    pub fn chapters(&self) -> Option<&Path> {
        self.chapters_file.as_deref()
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// Steps add their own section and never overwrite another step's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Clip identifier.
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    /// Source streams (from Probe step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<StreamDescriptor>>,
    /// Encoded stream (from Encode step).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode: Option<EncodeOutput>,
    /// Mux step results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxOutput>,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Check if the source was probed.
    pub fn has_streams(&self) -> bool {
        self.streams.is_some()
    }

    /// Check if encoding has been completed.
    pub fn has_encode(&self) -> bool {
        self.encode.is_some()
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}
