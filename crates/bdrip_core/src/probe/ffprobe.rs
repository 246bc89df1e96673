//! Stream probing using ffprobe.
//!
//! Runs `ffprobe -show_streams -print_format json` against a source clip and
//! turns the stream list into `StreamDescriptor`s.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::process::{run_captured, ToolCommand};

use super::types::{ProbeError, ProbeResult, StreamDescriptor, StreamKind};

/// Enumerates the elementary streams of a source file.
#[derive(Debug, Clone)]
pub struct StreamProbe {
    command: ToolCommand,
    timeout: Option<Duration>,
}

impl StreamProbe {
    /// Create a probe running `command` with an optional deadline.
    pub fn new(command: ToolCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    /// Tool used for probing.
    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    /// Arguments passed to the prober for `source`.
    pub fn args(source: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            source.display().to_string(),
            "-show_streams".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
        ]
    }

    /// Probe `source` and return its streams in container order.
    pub fn probe(&self, source: &Path) -> ProbeResult<Vec<StreamDescriptor>> {
        if !source.exists() {
            return Err(ProbeError::SourceMissing(source.to_path_buf()));
        }

        tracing::debug!("Probing file: {}", source.display());

        let tool = self.command.name();
        let mut cmd = self.command.command();
        cmd.args(Self::args(source));
        let output = run_captured(&tool, &mut cmd, self.timeout)?;

        if !output.success() {
            return Err(ProbeError::Failed {
                tool,
                exit_code: output.exit_code(),
                message: output.stderr_lossy().trim().to_string(),
            });
        }

        parse_probe_json(&output.stdout)
    }
}

/// Parse the JSON document printed by `ffprobe -show_streams`.
pub fn parse_probe_json(data: &[u8]) -> ProbeResult<Vec<StreamDescriptor>> {
    let json: Value = serde_json::from_slice(data)
        .map_err(|e| ProbeError::InvalidOutput(format!("not JSON: {}", e)))?;

    let Some(root) = json.as_object() else {
        return Err(ProbeError::InvalidOutput(
            "top level is not an object".to_string(),
        ));
    };

    // ffprobe omits the key entirely when there are no streams.
    let Some(streams) = root.get("streams") else {
        return Ok(Vec::new());
    };
    let streams = streams
        .as_array()
        .ok_or_else(|| ProbeError::InvalidOutput("\"streams\" is not an array".to_string()))?;

    Ok(streams
        .iter()
        .enumerate()
        .map(|(position, stream)| parse_stream(stream, position))
        .collect())
}

fn parse_stream(stream: &Value, position: usize) -> StreamDescriptor {
    let kind = stream
        .get("codec_type")
        .and_then(|t| t.as_str())
        .map(StreamKind::from_codec_type)
        .unwrap_or(StreamKind::Unknown);

    let index = stream
        .get("index")
        .and_then(|i| i.as_u64())
        .map(|i| i as u32)
        .unwrap_or(position as u32);

    let frame_rate = match kind {
        StreamKind::Video => str_field(stream, "r_frame_rate").filter(|r| r != "0/0"),
        _ => None,
    };

    StreamDescriptor {
        index,
        kind,
        codec_name: str_field(stream, "codec_name").unwrap_or_else(|| "unknown".to_string()),
        codec_tag: str_field(stream, "codec_tag_string"),
        language: stream
            .get("tags")
            .and_then(|t| t.get("language"))
            .and_then(|l| l.as_str())
            .map(|s| s.to_string()),
        width: u32_field(stream, "width"),
        height: u32_field(stream, "height"),
        channels: u32_field(stream, "channels"),
        sample_rate: u32_field(stream, "sample_rate"),
        frame_rate,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Numeric field that ffprobe may print either as a number or a string.
fn u32_field(value: &Value, key: &str) -> Option<u32> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
