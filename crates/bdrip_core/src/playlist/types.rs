//! Playlist record types and errors.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ClipId;

/// Ticks per second of the disc clock used by playlist timestamps.
pub const DISC_CLOCK_HZ: u32 = 45_000;

/// One segment of a playlist, referencing a clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayItem {
    /// Clip information file name (e.g. `00001`).
    pub clip_id: ClipId,
    /// Clip codec identifier (normally `M2TS`).
    pub codec_id: String,
    /// Presentation start time in disc clock ticks.
    pub in_time: u32,
    /// Presentation end time in disc clock ticks.
    pub out_time: u32,
}

/// Playlist mark type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkType {
    /// Entry mark, used as a chapter point.
    Entry,
    /// Link point.
    LinkPoint,
    /// Any other value found on disc.
    Unknown,
}

impl From<u8> for MarkType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Entry,
            2 => Self::LinkPoint,
            _ => Self::Unknown,
        }
    }
}

/// A typed marker referencing a play item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMark {
    /// Mark type.
    pub mark_type: MarkType,
    /// Index of the play item this mark belongs to.
    pub play_item_ref: u16,
    /// Mark position in disc clock ticks.
    pub timestamp: u32,
    /// Mark duration in disc clock ticks (usually 0).
    pub duration: u32,
}

impl PlaylistMark {
    /// Whether this mark denotes a chapter.
    pub fn is_chapter(&self) -> bool {
        self.mark_type == MarkType::Entry
    }
}

/// Decoded contents of one playlist file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    /// Play items in playlist order.
    pub play_items: Vec<PlayItem>,
    /// Marks in playlist order.
    pub marks: Vec<PlaylistMark>,
}

impl PlaylistRecord {
    /// Chapter marks that reference the play item at `index`, in encounter order.
    pub fn chapter_marks_for(&self, index: usize) -> impl Iterator<Item = &PlaylistMark> {
        self.marks
            .iter()
            .filter(move |m| m.is_chapter() && usize::from(m.play_item_ref) == index)
    }
}

/// Error decoding a playlist file.
#[derive(Error, Debug)]
pub enum PlaylistError {
    /// The file could not be read.
    #[error("Failed to read playlist {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data is not a valid movie playlist (bad magic, truncated section).
    #[error("Failed to decode playlist: {0}")]
    Decode(#[from] mpls::MplsError),

    /// A structure is internally inconsistent.
    #[error("Malformed playlist: {0}")]
    Malformed(String),
}

impl PlaylistError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for playlist decoding.
pub type PlaylistResult<T> = Result<T, PlaylistError>;

/// Source of decoded playlist records.
///
/// The chapter extractor only depends on this trait, so any decoder that can
/// produce play items and marks can be plugged in.
pub trait PlaylistParser: Send + Sync {
    /// Decode the playlist file at `path`.
    fn parse(&self, path: &Path) -> PlaylistResult<PlaylistRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mark(mark_type: u8, play_item_ref: u16, timestamp: u32) -> PlaylistMark {
        PlaylistMark {
            mark_type: MarkType::from(mark_type),
            play_item_ref,
            timestamp,
            duration: 0,
        }
    }

    #[test]
    fn mark_type_from_raw() {
        assert_eq!(MarkType::from(1), MarkType::Entry);
        assert_eq!(MarkType::from(2), MarkType::LinkPoint);
        assert_eq!(MarkType::from(7), MarkType::Unknown);
    }

    #[test]
    fn chapter_marks_filter_by_type_and_item() {
        let record = PlaylistRecord {
            play_items: Vec::new(),
            marks: vec![
                mark(1, 0, 100),
                mark(2, 0, 150),
                mark(1, 1, 200),
                mark(1, 0, 300),
            ],
        };

        let stamps: Vec<u32> = record.chapter_marks_for(0).map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![100, 300]);
        assert_eq!(record.chapter_marks_for(1).count(), 1);
        assert_eq!(record.chapter_marks_for(2).count(), 0);
    }
}
