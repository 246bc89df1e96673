//! Transform capability types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::ProcessError;
use crate::ClipId;

/// Chroma subsampling of the produced frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaFormat {
    Yuv420,
    Yuv422,
    Yuv444,
    Mono,
}

impl ChromaFormat {
    /// Samples in both chroma planes of a `width`x`height` frame.
    fn chroma_samples(&self, width: usize, height: usize) -> usize {
        let half_w = width.div_ceil(2);
        let half_h = height.div_ceil(2);
        match self {
            Self::Yuv420 => 2 * half_w * half_h,
            Self::Yuv422 => 2 * half_w * height,
            Self::Yuv444 => 2 * width * height,
            Self::Mono => 0,
        }
    }

    /// Short name for logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yuv420 => "4:2:0",
            Self::Yuv422 => "4:2:2",
            Self::Yuv444 => "4:4:4",
            Self::Mono => "mono",
        }
    }
}

/// Properties of a produced video stream.
///
/// Everything the encoder is told about the stream comes from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    /// Bits per sample (8..=16).
    pub bits_per_sample: u8,
    pub chroma: ChromaFormat,
    /// Exact number of frames the sequence yields.
    pub frame_count: u64,
}

impl StreamMetadata {
    /// Check the values are usable by an encoder.
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.width == 0 || self.height == 0 {
            return Err(TransformError::InvalidMetadata(format!(
                "resolution {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.fps_num == 0 || self.fps_den == 0 {
            return Err(TransformError::InvalidMetadata(format!(
                "frame rate {}/{} is invalid",
                self.fps_num, self.fps_den
            )));
        }
        if !(8..=16).contains(&self.bits_per_sample) {
            return Err(TransformError::InvalidMetadata(format!(
                "bit depth {} is outside 8..=16",
                self.bits_per_sample
            )));
        }
        if self.frame_count == 0 {
            return Err(TransformError::InvalidMetadata(
                "stream has no frames".to_string(),
            ));
        }
        Ok(())
    }

    /// Bytes per sample as stored in a raw frame.
    pub fn bytes_per_sample(&self) -> usize {
        if self.bits_per_sample > 8 {
            2
        } else {
            1
        }
    }

    /// Size in bytes of one raw planar frame.
    pub fn frame_size(&self) -> usize {
        let width = self.width as usize;
        let height = self.height as usize;
        (width * height + self.chroma.chroma_samples(width, height)) * self.bytes_per_sample()
    }

    /// Frame rate as `num/den`.
    pub fn fps_string(&self) -> String {
        format!("{}/{}", self.fps_num, self.fps_den)
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{}x{} @ {} fps, {}-bit {}, {} frames",
            self.width,
            self.height,
            self.fps_string(),
            self.bits_per_sample,
            self.chroma.as_str(),
            self.frame_count
        )
    }
}

/// One raw planar frame (Y, then U and V planes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Lazy, finite, single-pass frame sequence.
pub type FrameSequence = Box<dyn Iterator<Item = Result<VideoFrame, TransformError>> + Send>;

/// What a transform hands to the encoder.
pub struct TransformOutput {
    pub metadata: StreamMetadata,
    pub frames: FrameSequence,
}

/// Per-item context passed to a transform. Never shared across items.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Clip being processed.
    pub clip_id: ClipId,
    /// The clip's private work directory.
    pub work_dir: PathBuf,
    /// Worker threads the transform may use.
    pub threads: usize,
}

/// Error from a video transform.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The source file does not exist.
    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    /// The transform's process could not be run or timed out.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The transform's process exited with an error.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// Reported stream properties are unusable or inconsistent.
    #[error("Invalid stream metadata: {0}")]
    InvalidMetadata(String),

    /// The frame stream was malformed or ended early.
    #[error("Frame stream error: {0}")]
    Stream(String),

    /// I/O error while reading frames.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by an in-process transform.
    #[error("{0}")]
    Custom(String),
}

impl TransformError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Process(e) if e.is_timeout())
    }
}

/// A user-supplied video transform.
///
/// Given a source clip it returns stream metadata plus a lazy frame
/// sequence. Implementations can wrap a subprocess (see `ScriptTransform`)
/// or filter frames in-process.
pub trait VideoTransform: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Start transforming `source`.
    fn transform(
        &self,
        source: &Path,
        context: &TransformContext,
    ) -> Result<TransformOutput, TransformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(width: u32, height: u32, bits: u8, chroma: ChromaFormat) -> StreamMetadata {
        StreamMetadata {
            width,
            height,
            fps_num: 24000,
            fps_den: 1001,
            bits_per_sample: bits,
            chroma,
            frame_count: 10,
        }
    }

    #[test]
    fn frame_size_by_format() {
        assert_eq!(meta(1920, 1080, 8, ChromaFormat::Yuv420).frame_size(), 3_110_400);
        assert_eq!(meta(1920, 1080, 10, ChromaFormat::Yuv420).frame_size(), 6_220_800);
        assert_eq!(meta(4, 2, 8, ChromaFormat::Yuv422).frame_size(), 16);
        assert_eq!(meta(4, 2, 8, ChromaFormat::Yuv444).frame_size(), 24);
        assert_eq!(meta(4, 2, 16, ChromaFormat::Mono).frame_size(), 16);
        // Odd sizes round chroma up.
        assert_eq!(meta(3, 3, 8, ChromaFormat::Yuv420).frame_size(), 9 + 8);
    }

    #[test]
    fn validate_catches_bad_values() {
        assert!(meta(16, 16, 8, ChromaFormat::Yuv420).validate().is_ok());
        assert!(meta(0, 16, 8, ChromaFormat::Yuv420).validate().is_err());
        assert!(meta(16, 16, 7, ChromaFormat::Yuv420).validate().is_err());

        let mut m = meta(16, 16, 10, ChromaFormat::Yuv420);
        m.fps_den = 0;
        assert!(matches!(m.validate(), Err(TransformError::InvalidMetadata(_))));

        let mut m = meta(16, 16, 10, ChromaFormat::Yuv420);
        m.frame_count = 0;
        assert!(m.validate().is_err());
    }

    #[test]
    fn summary_mentions_geometry() {
        let s = meta(1920, 1080, 10, ChromaFormat::Yuv420).summary();
        assert_eq!(s, "1920x1080 @ 24000/1001 fps, 10-bit 4:2:0, 10 frames");
    }
}
