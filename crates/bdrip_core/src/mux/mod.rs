//! Muxing module for mkvmerge integration.
//!
//! - **options_builder**: mkvmerge tokens for encoded video + source tracks + chapters
//! - **muxer**: runs mkvmerge and interprets its exit code

mod muxer;
mod options_builder;

pub use muxer::{MuxError, MuxOutput, Muxer};
pub use options_builder::MkvmergeOptionsBuilder;
