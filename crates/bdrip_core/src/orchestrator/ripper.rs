//! Per-clip rip: work directory, logger and the Probe → Encode → Mux pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chapters::ChapterFileMap;
use crate::config::Settings;
use crate::encode::Encoder;
use crate::jobs::{clip_work_dir, find_source};
use crate::logging::{JobLogger, LogCallback};
use crate::mux::Muxer;
use crate::probe::{StreamDescriptor, StreamProbe};
use crate::transform::VideoTransform;

use super::errors::PipelineError;
use super::pipeline::{CancelHandle, Pipeline, PipelineRunResult};
use super::steps::{EncodeStep, MuxStep, ProbeStep};
use super::types::{Context, JobState};

/// Factory for per-clip log callbacks.
pub type LogCallbackFactory = Box<dyn Fn(&str) -> Option<LogCallback> + Send + Sync>;

/// Result of ripping a single clip.
#[derive(Debug)]
pub struct JobResult {
    /// Clip that was processed.
    pub clip_id: String,
    /// Whether the clip completed successfully.
    pub success: bool,
    /// Path to output file (if successful).
    pub output_path: Option<PathBuf>,
    /// The first error encountered (if failed).
    pub error: Option<PipelineError>,
    /// Steps that completed.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
    /// Streams reported by the prober, if it ran.
    pub streams: Vec<StreamDescriptor>,
    /// Per-clip log file, once the logger was created.
    pub log_path: Option<PathBuf>,
}

impl JobResult {
    /// Create a successful result.
    pub fn success(clip_id: String, output_path: PathBuf, run_result: PipelineRunResult) -> Self {
        Self {
            clip_id,
            success: true,
            output_path: Some(output_path),
            error: None,
            steps_completed: run_result.steps_completed,
            steps_skipped: run_result.steps_skipped,
            streams: Vec::new(),
            log_path: None,
        }
    }

    /// Create a failed result.
    pub fn failure(clip_id: String, error: PipelineError) -> Self {
        Self {
            clip_id,
            success: false,
            output_path: None,
            error: Some(error),
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
            streams: Vec::new(),
            log_path: None,
        }
    }

    fn with_state(mut self, state: JobState, log_path: &Path) -> Self {
        self.streams = state.streams.unwrap_or_default();
        self.log_path = Some(log_path.to_path_buf());
        self
    }

    /// Error message (if failed).
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Rips single clips found in a source directory.
pub struct Ripper {
    source_dir: PathBuf,
    settings: Settings,
    transform: Arc<dyn VideoTransform>,
    cancel: CancelHandle,
    log_callbacks: Option<LogCallbackFactory>,
}

impl Ripper {
    /// Create a ripper reading clips from `source_dir`.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        settings: Settings,
        transform: Arc<dyn VideoTransform>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            settings,
            transform,
            cancel: CancelHandle::new(),
            log_callbacks: None,
        }
    }

    /// Share a cancellation flag, checked between steps.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send every clip's log lines to a callback as well as its log file.
    pub fn with_log_callbacks(mut self, factory: LogCallbackFactory) -> Self {
        self.log_callbacks = Some(factory);
        self
    }

    /// Build the pipeline for one clip.
    pub fn build_pipeline(&self) -> Pipeline {
        let tools = &self.settings.tools;
        let timeouts = &self.settings.timeouts;

        Pipeline::new()
            .with_step(ProbeStep::new(StreamProbe::new(
                tools.prober.clone(),
                timeouts.probe(),
            )))
            .with_step(EncodeStep::new(
                Arc::clone(&self.transform),
                Encoder::new(tools.encoder.clone(), timeouts.encode()),
                self.settings.encoder.clone(),
            ))
            .with_step(MuxStep::new(Muxer::new(tools.muxer.clone(), timeouts.mux())))
            .with_cancel_handle(self.cancel.clone())
    }

    /// Rip `clip_id` into `output_path`, working under `batch_work_root`.
    ///
    /// Never panics or returns early with an error: every failure ends up
    /// in the returned `JobResult`.
    pub fn rip(
        &self,
        clip_id: &str,
        batch_work_root: &Path,
        output_path: &Path,
        chapters: &ChapterFileMap,
    ) -> JobResult {
        let fail = |message: String| {
            JobResult::failure(
                clip_id.to_string(),
                PipelineError::setup_failed(clip_id, message),
            )
        };

        let work_dir = clip_work_dir(batch_work_root, clip_id);
        if let Err(e) = fs::create_dir_all(&work_dir) {
            return fail(format!(
                "Failed to create work directory {}: {}",
                work_dir.display(),
                e
            ));
        }

        let source_path = match find_source(
            &self.source_dir,
            clip_id,
            &self.settings.batch.source_extension,
        ) {
            Ok(Some(path)) => path,
            Ok(None) => {
                return fail(format!(
                    "No source file for clip in {}",
                    self.source_dir.display()
                ))
            }
            Err(e) => {
                return fail(format!(
                    "Failed to read source directory {}: {}",
                    self.source_dir.display(),
                    e
                ))
            }
        };

        let callback = self.log_callbacks.as_ref().and_then(|f| f(clip_id));
        let logger = match JobLogger::new(
            clip_id,
            &work_dir,
            self.settings.logging.to_log_config(),
            callback,
        ) {
            Ok(logger) => Arc::new(logger),
            Err(e) => return fail(format!("Failed to create logger: {}", e)),
        };

        let ctx = Context::new(
            clip_id,
            source_path,
            work_dir,
            output_path.to_path_buf(),
            Arc::clone(&logger),
        )
        .with_chapters(chapters.get(clip_id).cloned());

        logger.info(&format!("Starting clip: {}", clip_id));
        logger.info(&format!("Source: {}", ctx.source_path.display()));
        logger.info(&format!("Work directory: {}", ctx.work_dir.display()));

        let mut state = JobState::new(clip_id);
        let result = match self.build_pipeline().run(&ctx, &mut state) {
            Ok(run_result) => {
                let output_path = state
                    .mux
                    .as_ref()
                    .map(|m| m.output_path.clone())
                    .unwrap_or_else(|| output_path.to_path_buf());
                logger.info(&format!("Clip completed: {}", output_path.display()));
                JobResult::success(clip_id.to_string(), output_path, run_result)
            }
            Err(e) => {
                logger.error(&format!("Pipeline failed: {}", e));
                JobResult::failure(clip_id.to_string(), e)
            }
        };

        logger.close();
        result.with_state(state, logger.log_path())
    }
}
