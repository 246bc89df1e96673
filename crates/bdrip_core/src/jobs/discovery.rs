//! Source clip discovery and batch naming.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::ClipId;

/// Directory name format of a batch work root (`25_03_14_21_07_45`).
pub const BATCH_DIR_FORMAT: &str = "%y_%m_%d_%H_%M_%S";

/// List clip identifiers in `dir`: stems of files with `extension`, sorted.
///
/// The extension is matched case-insensitively.
pub fn discover_clips(dir: &Path, extension: &str) -> io::Result<Vec<ClipId>> {
    let mut clips: Vec<ClipId> = source_files(dir, extension)?
        .into_iter()
        .filter_map(|path| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .collect();
    clips.sort();
    clips.dedup();
    Ok(clips)
}

/// Locate the source file for `clip_id` in `dir`.
pub fn find_source(dir: &Path, clip_id: &str, extension: &str) -> io::Result<Option<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let direct = dir.join(format!("{}.{}", clip_id, extension));
    if direct.is_file() {
        return Ok(Some(direct));
    }

    Ok(source_files(dir, extension)?
        .into_iter()
        .find(|path| path.file_stem().is_some_and(|stem| stem == clip_id)))
}

/// Output file name for a clip (`clip_00001.mkv`).
pub fn output_file_name(prefix: &str, clip_id: &str, extension: &str) -> String {
    format!("{}{}.{}", prefix, clip_id, extension.trim_start_matches('.'))
}

/// Timestamped work directory for one batch under `work_root`.
pub fn batch_work_root(work_root: &Path, now: DateTime<Local>) -> PathBuf {
    work_root.join(now.format(BATCH_DIR_FORMAT).to_string())
}

/// Per-clip work directory under a batch work root.
pub fn clip_work_dir(batch_root: &Path, clip_id: &str) -> PathBuf {
    batch_root.join(format!("{}_build", clip_id))
}

fn source_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
