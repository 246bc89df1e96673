//! Batch inputs: which clips exist and where their files go.

mod discovery;

pub use discovery::{
    batch_work_root, clip_work_dir, discover_clips, find_source, output_file_name,
    BATCH_DIR_FORMAT,
};
