//! Chapter extraction module.
//!
//! Turns playlist chapter marks into per-clip chapter text files that the
//! muxer attaches to the finished output.
//!
//! # Features
//!
//! - **Scanning**: Decode every playlist in a directory, one chapter set per play item
//! - **Selection**: Keep the largest set seen for each clip, drop sets under two entries
//! - **Serialization**: Write `CHAPTERnn=` / `CHAPTERnnNAME=` text files
//!
//! # Usage
//!
//! ```ignore
//! use bdrip_core::chapters::ChapterExtractor;
//!
//! let files = ChapterExtractor::new().extract_to(Path::new("PLAYLIST"), &work_root)?;
//! if let Some(path) = files.get("00001") {
//!     println!("chapters for 00001 in {}", path.display());
//! }
//! ```

mod extractor;
mod types;

pub use extractor::{chapters_from_playlist, ticks_to_millis, ChapterExtractor, MIN_CHAPTERS};
pub use types::{
    format_chapter_timestamp, ChapterEntry, ChapterError, ChapterFileMap, ChapterResult,
    ChapterSet,
};
