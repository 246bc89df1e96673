//! Stream descriptor types and probe errors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::ProcessError;

/// Elementary stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl StreamKind {
    /// Parse from the prober's `codec_type` string.
    pub fn from_codec_type(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            "data" => Self::Data,
            "attachment" => Self::Attachment,
            _ => Self::Unknown,
        }
    }

    /// Lowercase name for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Data => "data",
            Self::Attachment => "attachment",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One elementary stream in a source container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream index within the container.
    pub index: u32,
    /// Stream type.
    pub kind: StreamKind,
    /// Codec short name (e.g. "h264", "truehd", "hdmv_pgs_subtitle").
    pub codec_name: String,
    /// Codec tag string as reported by the prober.
    pub codec_tag: Option<String>,
    /// Language tag (e.g. "eng").
    pub language: Option<String>,
    /// Video width in pixels.
    pub width: Option<u32>,
    /// Video height in pixels.
    pub height: Option<u32>,
    /// Audio channel count.
    pub channels: Option<u32>,
    /// Audio sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Frame rate as a rational string (e.g. "24000/1001").
    pub frame_rate: Option<String>,
}

impl StreamDescriptor {
    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("#{} {} {}", self.index, self.kind, self.codec_name)];
        if let (Some(w), Some(h)) = (self.width, self.height) {
            parts.push(format!("{}x{}", w, h));
        }
        if let Some(rate) = &self.frame_rate {
            parts.push(format!("{} fps", rate));
        }
        if let Some(channels) = self.channels {
            parts.push(format!("{}ch", channels));
        }
        if let Some(rate) = self.sample_rate {
            parts.push(format!("{} Hz", rate));
        }
        if let Some(lang) = &self.language {
            parts.push(format!("[{}]", lang));
        }
        parts.join(" ")
    }
}

/// Error from probing a source file.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The source file does not exist.
    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    /// The prober could not be run or timed out.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The prober exited with an error.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// The prober output could not be parsed.
    #[error("Invalid prober output: {0}")]
    InvalidOutput(String),
}

impl ProbeError {
    /// Whether this failure should abort the item rather than be skipped.
    ///
    /// Only an unreadable source is fatal; every later stage would fail too.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceMissing(_))
    }
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_codec_type() {
        assert_eq!(StreamKind::from_codec_type("video"), StreamKind::Video);
        assert_eq!(StreamKind::from_codec_type("AUDIO"), StreamKind::Audio);
        assert_eq!(StreamKind::from_codec_type("subtitle"), StreamKind::Subtitle);
        assert_eq!(StreamKind::from_codec_type("weird"), StreamKind::Unknown);
    }

    #[test]
    fn only_missing_source_is_fatal() {
        assert!(ProbeError::SourceMissing(PathBuf::from("/x.m2ts")).is_fatal());
        assert!(!ProbeError::InvalidOutput("x".to_string()).is_fatal());
        assert!(!ProbeError::Process(ProcessError::Timeout {
            tool: "ffprobe".to_string(),
            secs: 1
        })
        .is_fatal());
    }

    #[test]
    fn summary_lists_known_fields() {
        let stream = StreamDescriptor {
            index: 1,
            kind: StreamKind::Audio,
            codec_name: "truehd".to_string(),
            codec_tag: None,
            language: Some("eng".to_string()),
            width: None,
            height: None,
            channels: Some(8),
            sample_rate: Some(48000),
            frame_rate: None,
        };
        assert_eq!(stream.summary(), "#1 audio truehd 8ch 48000 Hz [eng]");
    }
}
