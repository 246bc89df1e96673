//! Source stream probing.
//!
//! Gathers the elementary stream list of each source clip. The result is
//! informational: it is logged and recorded on the job, but muxing does not
//! depend on it.

mod ffprobe;
mod types;

pub use ffprobe::{parse_probe_json, StreamProbe};
pub use types::{ProbeError, ProbeResult, StreamDescriptor, StreamKind};
