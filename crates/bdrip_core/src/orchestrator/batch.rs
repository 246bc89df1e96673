//! Batch runner - one chapter pass, then every clip in turn.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::chapters::{ChapterError, ChapterExtractor};
use crate::config::Settings;
use crate::jobs::{batch_work_root, discover_clips, output_file_name};
use crate::transform::VideoTransform;

use super::pipeline::CancelHandle;
use super::ripper::{JobResult, Ripper};

/// Failures that stop a batch before any clip runs.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Failed to create batch work root {path}: {source}")]
    WorkRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chapter extraction failed: {0}")]
    Chapters(#[from] ChapterError),

    #[error("Failed to list source directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// Timestamped directory holding chapter files and clip work directories.
    pub work_root: PathBuf,
    /// One result per clip that was started, in clip order.
    pub results: Vec<JobResult>,
    /// Wall time of the whole batch.
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Log the elapsed time and success/failure counts.
    pub fn log_summary(&self) {
        tracing::info!(
            "Batch finished in {:.2}s: {} succeeded, {} failed",
            self.elapsed.as_secs_f64(),
            self.succeeded(),
            self.failed()
        );
        for result in self.results.iter().filter(|r| !r.success) {
            tracing::warn!(
                "  {}: {}",
                result.clip_id,
                result.error_message().unwrap_or_default()
            );
        }
    }
}

/// Drives the per-clip ripper over every clip of a source directory.
pub struct BatchRunner {
    settings: Settings,
    transform: Arc<dyn VideoTransform>,
    cancel: CancelHandle,
}

impl BatchRunner {
    pub fn new(settings: Settings, transform: Arc<dyn VideoTransform>) -> Self {
        Self {
            settings,
            transform,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle that stops the batch before the next clip (or step) starts.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Extract chapters, then rip each clip in `source_dir` sequentially.
    ///
    /// A failing clip is logged and recorded; the next one still runs.
    pub fn run_all(
        &self,
        source_dir: &Path,
        playlist_dir: &Path,
        work_root: &Path,
        output_dir: &Path,
    ) -> Result<BatchReport, BatchError> {
        let started = Instant::now();
        let batch = &self.settings.batch;

        let root = batch_work_root(work_root, Local::now());
        fs::create_dir_all(&root).map_err(|source| BatchError::WorkRoot {
            path: root.clone(),
            source,
        })?;
        tracing::info!("Batch work root: {}", root.display());

        let chapters = ChapterExtractor::new()
            .playlist_extension(batch.playlist_extension.as_str())
            .min_chapters(batch.min_chapters)
            .extract_to(playlist_dir, &root)?;

        let clips = discover_clips(source_dir, &batch.source_extension).map_err(|source| {
            BatchError::Discovery {
                path: source_dir.to_path_buf(),
                source,
            }
        })?;
        tracing::info!(
            "Found {} clip(s) in {}",
            clips.len(),
            source_dir.display()
        );

        let ripper = Ripper::new(source_dir, self.settings.clone(), Arc::clone(&self.transform))
            .with_cancel_handle(self.cancel.clone());

        let mut results = Vec::with_capacity(clips.len());
        for (index, clip_id) in clips.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Batch cancelled, {} clip(s) not started",
                    clips.len() - index
                );
                break;
            }

            let output_path = output_dir.join(output_file_name(
                &batch.output_prefix,
                clip_id,
                &batch.output_extension,
            ));
            tracing::info!("[{}/{}] Ripping clip {}", index + 1, clips.len(), clip_id);

            let result = ripper.rip(clip_id, &root, &output_path, &chapters);
            if result.success {
                tracing::info!("Clip {} done: {}", clip_id, output_path.display());
            } else {
                tracing::error!(
                    "Clip {} failed: {}",
                    clip_id,
                    result.error_message().unwrap_or_default()
                );
            }
            results.push(result);
        }

        let report = BatchReport {
            work_root: root,
            results,
            elapsed: started.elapsed(),
        };
        report.log_summary();
        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::logging::init_test_tracing;
    use crate::orchestrator::errors::ErrorKind;
    use crate::test_support::{FakeTools, MplsBuilder, SyntheticTransform};

    struct Layout {
        source: PathBuf,
        playlists: PathBuf,
        work: PathBuf,
        output: PathBuf,
    }

    fn layout(tools: &FakeTools, clips: &[&str]) -> Layout {
        let base = tools.dir();
        let layout = Layout {
            source: base.join("STREAM"),
            playlists: base.join("PLAYLIST"),
            work: base.join("build"),
            output: base.join("out"),
        };
        fs::create_dir_all(&layout.source).unwrap();
        fs::create_dir_all(&layout.playlists).unwrap();
        for clip in clips {
            fs::write(layout.source.join(format!("{}.m2ts", clip)), b"source").unwrap();
        }
        layout
    }

    #[test]
    fn failing_clip_does_not_stop_batch() {
        init_test_tracing();
        let tools = FakeTools::new();
        let dirs = layout(&tools, &["01", "02", "03"]);
        let transform = Arc::new(SyntheticTransform::new(4, 2, 3).failing_for("02"));
        let runner = BatchRunner::new(tools.settings(), transform);

        let report = runner
            .run_all(&dirs.source, &dirs.playlists, &dirs.work, &dirs.output)
            .unwrap();

        let ids: Vec<_> = report.results.iter().map(|r| r.clip_id.as_str()).collect();
        assert_eq!(ids, vec!["01", "02", "03"]);
        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert!(report.results[2].success);
        assert_eq!(
            report.results[1].error.as_ref().map(|e| e.kind()),
            Some(ErrorKind::Transform)
        );

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_succeeded());
        assert!(dirs.output.join("clip_01.mkv").exists());
        assert!(!dirs.output.join("clip_02.mkv").exists());
        assert!(dirs.output.join("clip_03.mkv").exists());
        report.log_summary();
    }

    #[test]
    fn chapters_muxed_only_where_extracted() {
        init_test_tracing();
        let tools = FakeTools::new();
        let dirs = layout(&tools, &["A", "B"]);
        MplsBuilder::new()
            .play_item("A", 0, 45_000 * 600)
            .chapter(0, 0)
            .chapter(0, 45_000 * 60)
            .chapter(0, 45_000 * 120)
            .chapter(0, 45_000 * 180)
            .write_to(&dirs.playlists.join("00000.mpls"));

        let runner = BatchRunner::new(tools.settings(), Arc::new(SyntheticTransform::new(4, 2, 2)));
        let report = runner
            .run_all(&dirs.source, &dirs.playlists, &dirs.work, &dirs.output)
            .unwrap();

        assert_eq!(report.succeeded(), 2);
        assert!(report.all_succeeded());

        let chapter_file = report.work_root.join("A.txt");
        let text = fs::read_to_string(&chapter_file).unwrap();
        assert!(text.contains("CHAPTER04=00:03:00.000000"));

        let a_args = fs::read_to_string(dirs.output.join("clip_A.mkv")).unwrap();
        assert!(a_args.contains("--chapters"));
        assert!(a_args.contains(chapter_file.to_str().unwrap()));

        let b_args = fs::read_to_string(dirs.output.join("clip_B.mkv")).unwrap();
        assert!(!b_args.contains("--chapters"));
        assert!(report.work_root.join("B_build").is_dir());
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let tools = FakeTools::new();
        let dirs = layout(&tools, &["01", "02"]);
        let runner = BatchRunner::new(tools.settings(), Arc::new(SyntheticTransform::new(4, 2, 2)));
        runner.cancel_handle().cancel();

        let report = runner
            .run_all(&dirs.source, &dirs.playlists, &dirs.work, &dirs.output)
            .unwrap();
        assert!(report.results.is_empty());
        assert!(!dirs.output.exists());
    }

    #[test]
    fn missing_playlist_dir_is_fatal() {
        let tools = FakeTools::new();
        let dirs = layout(&tools, &["01"]);
        let runner = BatchRunner::new(tools.settings(), Arc::new(SyntheticTransform::new(4, 2, 2)));

        let err = runner
            .run_all(&dirs.source, &tools.dir().join("missing"), &dirs.work, &dirs.output)
            .unwrap_err();
        assert!(matches!(err, BatchError::Chapters(ChapterError::ReadDir { .. })));
    }
}
