//! Chapter extraction from playlist marks.
//!
//! Every playlist in a directory is decoded; each play item with chapter
//! marks yields a chapter set for the clip it references. When several
//! playlists chapter the same clip, the set with the most entries wins and
//! ties keep the first playlist in file name order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::playlist::{MplsParser, PlayItem, PlaylistMark, PlaylistParser, PlaylistRecord, DISC_CLOCK_HZ};
use crate::ClipId;

use super::types::{ChapterError, ChapterFileMap, ChapterResult, ChapterSet};

/// Smallest chapter set worth persisting.
pub const MIN_CHAPTERS: usize = 2;

/// Scans a playlist directory and persists per-clip chapter files.
#[derive(Debug, Clone)]
pub struct ChapterExtractor<P = MplsParser> {
    parser: P,
    playlist_extension: String,
    min_chapters: usize,
}

impl ChapterExtractor<MplsParser> {
    /// Create an extractor using the built-in `.mpls` decoder.
    pub fn new() -> Self {
        Self::with_parser(MplsParser::new())
    }
}

impl Default for ChapterExtractor<MplsParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PlaylistParser> ChapterExtractor<P> {
    /// Create an extractor with a custom playlist decoder.
    pub fn with_parser(parser: P) -> Self {
        Self {
            parser,
            playlist_extension: "mpls".to_string(),
            min_chapters: MIN_CHAPTERS,
        }
    }

    /// Set the playlist file extension (matched case-insensitively).
    pub fn playlist_extension(mut self, extension: impl Into<String>) -> Self {
        self.playlist_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Set the minimum chapter count; values below 2 are raised to 2.
    pub fn min_chapters(mut self, min: usize) -> Self {
        self.min_chapters = min.max(MIN_CHAPTERS);
        self
    }

    /// Decode every playlist in `playlist_dir` and select one chapter set per clip.
    ///
    /// A playlist that fails to decode is logged and skipped. Only failing
    /// to list the directory is an error.
    pub fn scan(&self, playlist_dir: &Path) -> ChapterResult<BTreeMap<ClipId, ChapterSet>> {
        let playlists = self.list_playlists(playlist_dir)?;
        tracing::debug!(
            "Scanning {} playlist(s) in {}",
            playlists.len(),
            playlist_dir.display()
        );

        let mut selected: BTreeMap<ClipId, ChapterSet> = BTreeMap::new();
        for path in &playlists {
            let record = match self.parser.parse(path) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping playlist {}: {}", path.display(), e);
                    continue;
                }
            };

            for (clip_id, set) in chapters_from_playlist(&record) {
                if !set.is_strictly_increasing() {
                    tracing::warn!(
                        "Chapter marks for clip {} in {} are not in increasing order, keeping them as listed",
                        clip_id,
                        path.display()
                    );
                }
                let replace = selected
                    .get(&clip_id)
                    .map_or(true, |current| current.len() < set.len());
                if replace {
                    tracing::trace!(
                        "{}: {} chapter(s) for clip {}",
                        path.display(),
                        set.len(),
                        clip_id
                    );
                    selected.insert(clip_id, set);
                }
            }
        }

        let before = selected.len();
        selected.retain(|clip_id, set| {
            let keep = set.len() >= self.min_chapters;
            if !keep {
                tracing::debug!("Discarding {} chapter(s) for clip {}", set.len(), clip_id);
            }
            keep
        });

        tracing::info!(
            "Chapters found for {} clip(s) ({} discarded) from {} playlist(s)",
            selected.len(),
            before - selected.len(),
            playlists.len()
        );

        Ok(selected)
    }

    /// Write one `<clip>.txt` per chapter set into `output_dir`.
    pub fn persist(
        &self,
        sets: &BTreeMap<ClipId, ChapterSet>,
        output_dir: &Path,
    ) -> ChapterResult<ChapterFileMap> {
        fs::create_dir_all(output_dir).map_err(|source| ChapterError::Write {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut files = ChapterFileMap::new();
        for (clip_id, set) in sets {
            let path = output_dir.join(format!("{}.txt", clip_id));
            fs::write(&path, set.to_text()).map_err(|source| ChapterError::Write {
                path: path.clone(),
                source,
            })?;
            tracing::debug!("Wrote {} chapter(s) to {}", set.len(), path.display());
            files.insert(clip_id.clone(), path);
        }
        Ok(files)
    }

    /// Scan `playlist_dir` and persist the result into `output_dir`.
    pub fn extract_to(&self, playlist_dir: &Path, output_dir: &Path) -> ChapterResult<ChapterFileMap> {
        let sets = self.scan(playlist_dir)?;
        self.persist(&sets, output_dir)
    }

    fn list_playlists(&self, dir: &Path) -> ChapterResult<Vec<PathBuf>> {
        let read_dir_err = |source| ChapterError::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            let matches = path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(&self.playlist_extension));
            if matches {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Build the chapter sets of one playlist, one per play item with chapter marks.
///
/// Sets are returned in play item order and are not filtered by size.
pub fn chapters_from_playlist(record: &PlaylistRecord) -> Vec<(ClipId, ChapterSet)> {
    record
        .play_items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let marks: Vec<&PlaylistMark> = record.chapter_marks_for(index).collect();
            chapters_for_item(item, &marks).map(|set| (item.clip_id.clone(), set))
        })
        .collect()
}

fn chapters_for_item(item: &PlayItem, marks: &[&PlaylistMark]) -> Option<ChapterSet> {
    let first = marks.first()?;
    let offset = first.timestamp.min(item.in_time);

    let mut set = ChapterSet::new();
    for mark in marks {
        let ticks = i64::from(mark.timestamp) - i64::from(offset);
        if ticks < 0 {
            tracing::warn!(
                "Chapter mark at {} precedes clip {} start {}, clamping to 0",
                mark.timestamp,
                item.clip_id,
                offset
            );
        }
        set.push(ticks_to_millis(ticks.max(0)));
    }
    Some(set)
}

/// Convert disc clock ticks to milliseconds.
pub fn ticks_to_millis(ticks: i64) -> f64 {
    ticks as f64 / f64::from(DISC_CLOCK_HZ) * 1000.0
}
