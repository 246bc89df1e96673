//! Settings struct with TOML-based sections.
//!
//! Every field has a serde default, so a partial file (or none at all) loads
//! into a complete `Settings`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::{LogConfig, LogLevel};
use crate::process::{limit_from_secs, ToolCommand};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Batch naming and discovery settings.
    #[serde(default)]
    pub batch: BatchSettings,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Encoder parameters.
    #[serde(default)]
    pub encoder: EncoderSettings,

    /// Deadlines for external processes.
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), String> {
        if self.encoder.threads == 0 {
            return Err("encoder.threads must be at least 1".to_string());
        }
        if self.encoder.frameserver_threads == 0 {
            return Err("encoder.frameserver_threads must be at least 1".to_string());
        }
        if self.batch.source_extension.trim_start_matches('.').is_empty() {
            return Err("batch.source_extension must not be empty".to_string());
        }
        if self.batch.playlist_extension.trim_start_matches('.').is_empty() {
            return Err("batch.playlist_extension must not be empty".to_string());
        }
        if self.batch.output_extension.trim_start_matches('.').is_empty() {
            return Err("batch.output_extension must not be empty".to_string());
        }
        Ok(())
    }
}

/// Path configuration for work, output, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root under which each batch creates its timestamped work directory.
    #[serde(default = "default_dot")]
    pub work_root: PathBuf,

    /// Output folder for finished files.
    #[serde(default = "default_dot")]
    pub output_folder: PathBuf,

    /// Folder for the application log file.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: PathBuf,
}

fn default_dot() -> PathBuf {
    PathBuf::from(".")
}

fn default_logs_folder() -> PathBuf {
    PathBuf::from(".logs")
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_root: default_dot(),
            output_folder: default_dot(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Clip discovery and output naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Extension of source clips.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Extension of playlist files.
    #[serde(default = "default_playlist_extension")]
    pub playlist_extension: String,

    /// Prefix of output file names.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Extension of output files.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Smallest chapter set that is kept.
    #[serde(default = "default_min_chapters")]
    pub min_chapters: usize,
}

fn default_source_extension() -> String {
    "m2ts".to_string()
}

fn default_playlist_extension() -> String {
    "mpls".to_string()
}

fn default_output_prefix() -> String {
    "clip_".to_string()
}

fn default_output_extension() -> String {
    "mkv".to_string()
}

fn default_min_chapters() -> usize {
    2
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            playlist_extension: default_playlist_extension(),
            output_prefix: default_output_prefix(),
            output_extension: default_output_extension(),
            min_chapters: default_min_chapters(),
        }
    }
}

/// External tools. Bare names are looked up on `PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Stream prober.
    #[serde(default = "default_prober")]
    pub prober: ToolCommand,

    /// Video encoder.
    #[serde(default = "default_encoder")]
    pub encoder: ToolCommand,

    /// Muxer.
    #[serde(default = "default_muxer")]
    pub muxer: ToolCommand,

    /// Frameserver that runs transform scripts.
    #[serde(default = "default_frameserver")]
    pub frameserver: ToolCommand,
}

fn default_prober() -> ToolCommand {
    ToolCommand::new("ffprobe")
}

fn default_encoder() -> ToolCommand {
    ToolCommand::new("x265")
}

fn default_muxer() -> ToolCommand {
    ToolCommand::new("mkvmerge")
}

fn default_frameserver() -> ToolCommand {
    ToolCommand::new("vspipe")
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            prober: default_prober(),
            encoder: default_encoder(),
            muxer: default_muxer(),
            frameserver: default_frameserver(),
        }
    }
}

impl ToolSettings {
    /// Copy with every bare program name resolved against `PATH`.
    pub fn resolved(&self) -> Self {
        Self {
            prober: self.prober.resolved(),
            encoder: self.encoder.resolved(),
            muxer: self.muxer.resolved(),
            frameserver: self.frameserver.resolved(),
        }
    }
}

/// Encoder invocation parameters that do not come from the stream itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Encoder thread pool size.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Threads handed to the transform script.
    #[serde(default = "default_frameserver_threads")]
    pub frameserver_threads: usize,

    /// Color matrix tag written into the stream.
    #[serde(default = "default_color_matrix")]
    pub color_matrix: String,

    /// Assembly level; empty to let the encoder decide.
    #[serde(default = "default_asm")]
    pub asm: String,

    /// Tuning flags appended after the stream parameters.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

fn default_threads() -> usize {
    16
}

fn default_frameserver_threads() -> usize {
    1
}

fn default_color_matrix() -> String {
    "bt709".to_string()
}

fn default_asm() -> String {
    "avx2".to_string()
}

fn default_extra_args() -> Vec<String> {
    [
        "--no-open-gop",
        "--preset",
        "placebo",
        "--deblock",
        "-1:-1",
        "--b-intra",
        "--no-rect",
        "--no-amp",
        "--weightb",
        "--ref",
        "7",
        "--rd",
        "6",
        "--no-sao",
        "--crf",
        "15",
        "--aq-mode",
        "1",
        "--aq-strength",
        "0.8",
        "--psy-rd",
        "3.3",
        "--psy-rdoq",
        "1.3",
        "--pbratio",
        "1.2",
        "--cbqpoffs",
        "-1",
        "--crqpoffs",
        "-1",
        "--no-strong-intra-smoothing",
        "--rc-lookahead",
        "66",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            frameserver_threads: default_frameserver_threads(),
            color_matrix: default_color_matrix(),
            asm: default_asm(),
            extra_args: default_extra_args(),
        }
    }
}

/// Deadlines in seconds; 0 disables the deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,

    #[serde(default)]
    pub encode_secs: u64,

    #[serde(default = "default_mux_secs")]
    pub mux_secs: u64,

    #[serde(default = "default_transform_info_secs")]
    pub transform_info_secs: u64,
}

fn default_probe_secs() -> u64 {
    120
}

fn default_mux_secs() -> u64 {
    3600
}

fn default_transform_info_secs() -> u64 {
    600
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            probe_secs: default_probe_secs(),
            encode_secs: 0,
            mux_secs: default_mux_secs(),
            transform_info_secs: default_transform_info_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn probe(&self) -> Option<Duration> {
        limit_from_secs(self.probe_secs)
    }

    pub fn encode(&self) -> Option<Duration> {
        limit_from_secs(self.encode_secs)
    }

    pub fn mux(&self) -> Option<Duration> {
        limit_from_secs(self.mux_secs)
    }

    pub fn transform_info(&self) -> Option<Duration> {
        limit_from_secs(self.transform_info_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,

    /// Keep external tool output out of per-clip logs unless a tool fails.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines shown after a failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: usize,

    /// Also write a daily-rolling application log into `paths.logs_folder`.
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> usize {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            error_tail: default_error_tail(),
            log_to_file: false,
        }
    }
}

impl LoggingSettings {
    /// Per-clip logger configuration.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            error_tail: self.error_tail,
            ..LogConfig::default()
        }
    }
}
