//! Movie playlist (`.mpls`) decoder backed by the `mpls` crate.
//!
//! The crate decodes the whole playlist; only the play items and the
//! mark list are carried over into a `PlaylistRecord`.

use std::fs;
use std::panic;
use std::path::Path;

use mpls::Mpls;

use super::types::{
    MarkType, PlayItem, PlaylistError, PlaylistMark, PlaylistParser, PlaylistRecord,
    PlaylistResult,
};

/// Decoder for the binary movie playlist format.
#[derive(Debug, Default, Clone, Copy)]
pub struct MplsParser;

impl MplsParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Decode a playlist from memory.
    pub fn parse_bytes(&self, data: &[u8]) -> PlaylistResult<PlaylistRecord> {
        // The decoder panics on clip names that are not valid UTF-8.
        let mpls = panic::catch_unwind(|| Mpls::from(data))
            .map_err(|_| PlaylistError::Malformed("clip name is not valid UTF-8".to_string()))??;
        Ok(record_from(&mpls))
    }
}

impl PlaylistParser for MplsParser {
    fn parse(&self, path: &Path) -> PlaylistResult<PlaylistRecord> {
        let data = fs::read(path).map_err(|e| PlaylistError::io(path, e))?;
        self.parse_bytes(&data)
    }
}

fn record_from(mpls: &Mpls) -> PlaylistRecord {
    let play_items = mpls
        .play_list
        .play_items
        .iter()
        .map(|item| PlayItem {
            clip_id: item.clip.file_name.trim_end_matches('\0').to_string(),
            codec_id: item.clip.codec_id.clone(),
            in_time: item.in_time.0,
            out_time: item.out_time.0,
        })
        .collect();

    let marks = mpls
        .marks
        .iter()
        .map(|mark| PlaylistMark {
            mark_type: mark_type(&mark.mark_type),
            play_item_ref: mark.play_item.0,
            timestamp: mark.time_stamp.0,
            duration: mark.duration.map_or(0, |d| d.0),
        })
        .collect();

    PlaylistRecord { play_items, marks }
}

fn mark_type(raw: &mpls::MarkType) -> MarkType {
    match raw {
        mpls::MarkType::EntryPoint => MarkType::Entry,
        mpls::MarkType::LinkPoint => MarkType::LinkPoint,
        mpls::MarkType::Unknown => MarkType::Unknown,
    }
}
