//! External process supervision.
//!
//! Every external tool (prober, frameserver, encoder, muxer) is launched
//! through this module so that:
//! - tool locations are configurable (`ToolCommand`)
//! - each child gets an optional deadline enforced by a watchdog thread
//! - stdio is drained and the child is reaped on every exit path
//!
//! # Usage
//!
//! ```ignore
//! use bdrip_core::process::{run_captured, ToolCommand};
//!
//! let prober = ToolCommand::new("ffprobe").resolved();
//! let mut cmd = prober.command();
//! cmd.arg("-version");
//! let output = run_captured(&prober.name(), &mut cmd, Some(Duration::from_secs(10)))?;
//! ```

mod runner;
mod types;

pub use runner::{run_captured, spawn_line_drain, CapturedOutput, SupervisedChild};
pub use types::{limit_from_secs, ProcessError, ProcessResult, ToolCommand};
