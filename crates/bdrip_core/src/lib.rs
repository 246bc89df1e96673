//! bdrip core - backend logic for the automated disc rip workflow.
//!
//! A disc source is a flat directory of elementary container files (clips)
//! plus a directory of playlist files carrying chapter marks. This crate turns
//! that into one finished, remuxed file per clip:
//!
//! ```text
//! BatchRunner
//!     ├── ChapterExtractor (once per batch)  -> ChapterFileMap
//!     └── per clip: Ripper
//!             ├── Step: Probe   (ffprobe, informational)
//!             ├── Step: Encode  (user transform -> x265 over a pipe)
//!             └── Step: Mux     (mkvmerge + chapters)
//! ```
//!
//! It has no UI dependencies and is driven by the `bdrip` CLI.

pub mod chapters;
pub mod config;
pub mod encode;
pub mod jobs;
pub mod logging;
pub mod mux;
pub mod orchestrator;
pub mod playlist;
pub mod probe;
pub mod process;
pub mod transform;

#[cfg(test)]
mod test_support;

/// Stable key naming one source clip (the file stem, e.g. `00001`).
pub type ClipId = String;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
