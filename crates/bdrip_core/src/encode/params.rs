//! Encoder invocation parameters.
//!
//! Everything that describes the stream (frame count, geometry, rate, depth)
//! comes from `StreamMetadata`, so a mismatch cannot be configured by hand.

use std::path::{Path, PathBuf};

use crate::config::EncoderSettings;
use crate::transform::StreamMetadata;

use super::types::EncodeError;

/// Validated encoder parameters for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParams {
    metadata: StreamMetadata,
    threads: usize,
    color_matrix: String,
    asm: String,
    extra_args: Vec<String>,
    output: PathBuf,
}

impl EncodeParams {
    /// Derive parameters from transform metadata and encoder settings.
    pub fn from_metadata(
        metadata: &StreamMetadata,
        settings: &EncoderSettings,
        output: impl Into<PathBuf>,
    ) -> Result<Self, EncodeError> {
        metadata
            .validate()
            .map_err(|e| EncodeError::InvalidParams(e.to_string()))?;
        if settings.threads == 0 {
            return Err(EncodeError::InvalidParams(
                "encoder thread count must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            metadata: metadata.clone(),
            threads: settings.threads,
            color_matrix: settings.color_matrix.clone(),
            asm: settings.asm.clone(),
            extra_args: settings.extra_args.clone(),
            output: output.into(),
        })
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn frame_count(&self) -> u64 {
        self.metadata.frame_count
    }

    /// Path of the encoded elementary stream.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Encoder arguments, reading Y4M from stdin.
    pub fn args(&self) -> Vec<String> {
        let meta = &self.metadata;
        let depth = meta.bits_per_sample.to_string();

        let mut args = vec![
            "--frames".to_string(),
            meta.frame_count.to_string(),
            "--y4m".to_string(),
        ];
        if !self.asm.is_empty() {
            args.push("--asm".to_string());
            args.push(self.asm.clone());
        }
        args.push("--pools".to_string());
        args.push(self.threads.to_string());
        if !self.color_matrix.is_empty() {
            args.push("--colormatrix".to_string());
            args.push(self.color_matrix.clone());
        }
        args.extend([
            "--input-depth".to_string(),
            depth.clone(),
            "--output-depth".to_string(),
            depth,
            "--input-res".to_string(),
            format!("{}x{}", meta.width, meta.height),
            "--fps".to_string(),
            meta.fps_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args.extend([
            "--output".to_string(),
            self.output.display().to_string(),
            "-".to_string(),
        ]);
        args
    }
}
