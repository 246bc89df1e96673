//! Per-clip logger with file and callback output.
//!
//! Each clip gets its own logger that:
//! - Writes to a dedicated log file in the clip's work directory
//! - Sends messages to a callback (if provided)
//! - Mirrors every message to `tracing`
//! - Keeps a tail buffer of external tool output for error diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

/// Per-clip logger with dual output (file + callback).
///
/// Share it as `Arc<JobLogger>`; the stream drain threads of external tools
/// write into it concurrently.
pub struct JobLogger {
    /// The clip id.
    job_name: String,
    log_path: PathBuf,
    /// `None` once closed.
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Mutex<Option<LogCallback>>,
    config: LogConfig,
    /// Last `config.error_tail` lines of tool output.
    tail_buffer: Mutex<VecDeque<String>>,
}

impl JobLogger {
    /// Open `<log_dir>/<job_name>.log`, creating `log_dir` when needed.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        fs::create_dir_all(log_dir.as_ref())?;
        let log_path = log_dir
            .as_ref()
            .join(format!("{}.log", sanitize_filename(&job_name)));
        let writer = BufWriter::new(File::create(&log_path)?);

        Ok(Self {
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            file_writer: Mutex::new(Some(writer)),
            callback: Mutex::new(callback),
            job_name,
            log_path,
            config,
        })
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Mirror `message` to tracing, then write it if `level` passes the filter.
    pub fn log(&self, level: LogLevel, message: &str) {
        self.mirror(level, message);
        if level >= self.config.level {
            self.output(&self.format_message(message));
        }
    }

    fn marked(&self, level: LogLevel, prefix: MessagePrefix, message: &str) {
        self.log(level, &prefix.format(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.marked(LogLevel::Warn, MessagePrefix::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.marked(LogLevel::Error, MessagePrefix::Error, message);
    }

    /// `$ <command line>` for an external tool about to run.
    pub fn command(&self, command: &str) {
        self.marked(LogLevel::Info, MessagePrefix::Command, command);
    }

    /// `=== <step> ===` header.
    pub fn phase(&self, phase_name: &str) {
        self.marked(LogLevel::Info, MessagePrefix::Phase, phase_name);
    }

    /// `--- <section> ---` header inside a step.
    pub fn section(&self, section_name: &str) {
        self.marked(LogLevel::Info, MessagePrefix::Section, section_name);
    }

    pub fn success(&self, message: &str) {
        self.marked(LogLevel::Info, MessagePrefix::Success, message);
    }

    pub fn validation(&self, message: &str) {
        self.marked(LogLevel::Info, MessagePrefix::Validation, message);
    }

    /// Log an output line from an external tool.
    ///
    /// Lines always go to the tail buffer; in compact mode that is all.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 && buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            if self.config.error_tail > 0 {
                buffer.push_back(line.to_string());
            }
        }

        tracing::trace!(job = %self.job_name, "{}", line);
        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        self.output(&self.format_message(&format!("{}{}", prefix, line)));
    }

    /// Dump the tail buffer (typically after a tool failed).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        buffer
            .iter()
            .for_each(|line| self.output(&self.format_message(line)));
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    /// Snapshot of the buffered tool output, oldest first.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Log a token list one argument per line.
    pub fn log_options_pretty(&self, tool: &str, tokens: &[String]) {
        self.section(&format!("{} options", tool));
        self.info(&tokens.join(" \\\n  "));
    }

    pub fn flush(&self) {
        if let Some(writer) = self.file_writer.lock().as_mut() {
            let _ = writer.flush();
        }
    }

    /// Flush and release the log file; later messages only reach the callback.
    pub fn close(&self) {
        if let Some(mut writer) = self.file_writer.lock().take() {
            let _ = writer.flush();
        }
    }

    fn mirror(&self, level: LogLevel, message: &str) {
        let job = self.job_name.as_str();
        match level {
            LogLevel::Trace => tracing::trace!(job, "{}", message),
            LogLevel::Debug => tracing::debug!(job, "{}", message),
            LogLevel::Info => tracing::info!(job, "{}", message),
            LogLevel::Warn => tracing::warn!(job, "{}", message),
            LogLevel::Error => tracing::error!(job, "{}", message),
        }
    }

    fn format_message(&self, message: &str) -> String {
        if !self.config.show_timestamps {
            return message.to_string();
        }
        format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
    }

    fn output(&self, line: &str) {
        if let Some(writer) = self.file_writer.lock().as_mut() {
            let _ = writeln!(writer, "{}", line);
        }
        if let Some(callback) = self.callback.lock().as_ref() {
            callback(line);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Replace characters that cannot appear in a file name.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
