//! Pipeline orchestrator for ripping clips.
//!
//! Each clip runs through a fixed sequence of steps that validate,
//! execute and record their results in a write-once `JobState`. The
//! batch runner drives one `Ripper` call per clip and keeps going when
//! a clip fails.
//!
//! # Architecture
//!
//! ```text
//! BatchRunner
//!     └── Ripper (per clip)
//!             └── Pipeline
//!                     ├── Step: Probe
//!                     ├── Step: Encode
//!                     └── Step: Mux
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bdrip_core::orchestrator::BatchRunner;
//!
//! let runner = BatchRunner::new(settings, transform);
//! let report = runner.run_all(&m2ts_dir, &mpls_dir, &build_dir, &output_dir)?;
//! println!("{} succeeded, {} failed", report.succeeded(), report.failed());
//! ```

mod batch;
mod errors;
mod pipeline;
mod ripper;
mod step;
pub mod steps;
mod types;

pub use batch::{BatchError, BatchReport, BatchRunner};
pub use errors::{ErrorKind, PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use ripper::{JobResult, LogCallbackFactory, Ripper};
pub use step::PipelineStep;
pub use steps::{EncodeStep, MuxStep, ProbeStep, ENCODED_FILE_NAME};
pub use types::{Context, JobState, StepOutcome};
