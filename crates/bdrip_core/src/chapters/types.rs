//! Chapter types and error definitions.
//!
//! Provides the per-clip chapter set produced from playlist marks, its
//! text serialization, and errors that can occur while writing chapter files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ClipId;

/// A single chapter point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterEntry {
    /// 1-based chapter number, contiguous within a set.
    pub number: u32,
    /// Offset from the start of the clip in milliseconds.
    pub timestamp_ms: f64,
    /// `timestamp_ms` formatted as `HH:MM:SS.ffffff`.
    pub timestamp: String,
}

/// Ordered chapters for one clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterSet {
    entries: Vec<ChapterEntry>,
}

impl ChapterSet {
    /// Create an empty chapter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chapter; its number is the next in sequence.
    pub fn push(&mut self, timestamp_ms: f64) -> &ChapterEntry {
        let number = self.entries.len() as u32 + 1;
        self.entries.push(ChapterEntry {
            number,
            timestamp_ms,
            timestamp: format_chapter_timestamp(timestamp_ms),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// Get the number of chapters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no chapters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the chapters in order.
    pub fn entries(&self) -> &[ChapterEntry] {
        &self.entries
    }

    /// Whether timestamps strictly increase.
    pub fn is_strictly_increasing(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| pair[0].timestamp_ms < pair[1].timestamp_ms)
    }

    /// Serialize to the simple chapter text format understood by the muxer.
    ///
    /// ```text
    /// CHAPTER01=00:00:00.000000
    /// CHAPTER01NAME=Chapter 01
    /// ```
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!("CHAPTER{:02}={}\n", entry.number, entry.timestamp));
            out.push_str(&format!(
                "CHAPTER{:02}NAME=Chapter {:02}\n",
                entry.number, entry.number
            ));
        }
        out
    }
}

/// Clip id -> persisted chapter file. Built once per batch, read-only after.
pub type ChapterFileMap = BTreeMap<ClipId, PathBuf>;

/// Error types for chapter operations.
#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    /// The playlist directory could not be listed.
    #[error("Failed to read playlist directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chapter file could not be written.
    #[error("Failed to write chapter file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for chapter operation results.
pub type ChapterResult<T> = Result<T, ChapterError>;

/// Format a millisecond offset as `HH:MM:SS.ffffff`.
///
/// The value is rounded to whole microseconds. Hours are padded to at least
/// two digits; negative or non-finite input formats as zero.
pub fn format_chapter_timestamp(millis: f64) -> String {
    let micros = if millis.is_finite() && millis > 0.0 {
        (millis * 1000.0).round() as u64
    } else {
        0
    };

    let total_secs = micros / 1_000_000;
    let fraction = micros % 1_000_000;

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    format!("{:02}:{:02}:{:02}.{:06}", hours, minutes, seconds, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_timestamp_works() {
        assert_eq!(format_chapter_timestamp(0.0), "00:00:00.000000");
        assert_eq!(format_chapter_timestamp(1500.0), "00:00:01.500000");
        assert_eq!(format_chapter_timestamp(3_661_000.0), "01:01:01.000000");
        assert_eq!(format_chapter_timestamp(36_000_000.0), "10:00:00.000000");
    }

    #[test]
    fn format_rounds_to_microseconds() {
        // One disc clock tick is 22.2 microseconds.
        assert_eq!(format_chapter_timestamp(1.0 / 45.0), "00:00:00.000022");
        assert_eq!(format_chapter_timestamp(0.0014), "00:00:00.000001");
    }

    #[test]
    fn negative_formats_as_zero() {
        assert_eq!(format_chapter_timestamp(-250.0), "00:00:00.000000");
        assert_eq!(format_chapter_timestamp(f64::NAN), "00:00:00.000000");
    }

    #[test]
    fn format_is_monotonic() {
        let samples = [
            0.0, 0.02, 1.0, 999.999, 1000.0, 59_999.0, 60_000.0, 3_599_999.0, 3_600_000.0,
            7_261_500.5,
        ];
        let formatted: Vec<String> = samples.iter().map(|&ms| format_chapter_timestamp(ms)).collect();
        for pair in formatted.windows(2) {
            assert!(pair[0] <= pair[1], "{} > {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn push_numbers_sequentially() {
        let mut set = ChapterSet::new();
        assert_eq!(set.push(0.0).number, 1);
        assert_eq!(set.push(1000.0).number, 2);
        assert_eq!(set.push(2000.0).number, 3);
        assert_eq!(set.len(), 3);
        assert!(set.is_strictly_increasing());
    }

    #[test]
    fn text_format() {
        let mut set = ChapterSet::new();
        set.push(0.0);
        set.push(61_500.0);
        assert_eq!(
            set.to_text(),
            "CHAPTER01=00:00:00.000000\n\
             CHAPTER01NAME=Chapter 01\n\
             CHAPTER02=00:01:01.500000\n\
             CHAPTER02NAME=Chapter 02\n"
        );
    }
}
