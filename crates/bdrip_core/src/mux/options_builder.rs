//! mkvmerge command options builder.
//!
//! The encoded video stream replaces the source's video; every other track
//! of the source (audio, subtitles) is taken as-is.

use std::path::Path;

/// Builder for mkvmerge command-line options.
pub struct MkvmergeOptionsBuilder<'a> {
    output_path: &'a Path,
    encoded_video: &'a Path,
    source: &'a Path,
    chapters: Option<&'a Path>,
}

impl<'a> MkvmergeOptionsBuilder<'a> {
    pub fn new(output_path: &'a Path, encoded_video: &'a Path, source: &'a Path) -> Self {
        Self {
            output_path,
            encoded_video,
            source,
            chapters: None,
        }
    }

    /// Attach a chapter file, if there is one.
    pub fn with_chapters(mut self, chapters: Option<&'a Path>) -> Self {
        self.chapters = chapters;
        self
    }

    /// Build the complete mkvmerge command tokens.
    pub fn build(&self) -> Vec<String> {
        let mut tokens = vec![
            "-o".to_string(),
            self.output_path.to_string_lossy().to_string(),
            self.encoded_video.to_string_lossy().to_string(),
            "--no-video".to_string(),
            self.source.to_string_lossy().to_string(),
        ];

        if let Some(chapters) = self.chapters {
            tokens.push("--chapters".to_string());
            tokens.push(chapters.to_string_lossy().to_string());
        }

        tokens
    }
}
