//! Streams frames into the external encoder.
//!
//! Frames are written to the encoder's stdin as a Y4M stream as they are
//! produced. A full pipe blocks the writer and an empty pipe starves the
//! encoder, which is all the flow control there is.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::process::{ChildStdin, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::logging::JobLogger;
use crate::process::{spawn_line_drain, SupervisedChild, ToolCommand};
use crate::transform::{FrameSequence, Y4mHeader, FRAME_HEADER};

use super::params::EncodeParams;
use super::types::{EncodeError, EncodeOutput};

/// Lines of encoder output quoted in a failure message.
const MESSAGE_LINES: usize = 5;

/// Runs the encoder over a frame sequence.
#[derive(Debug, Clone)]
pub struct Encoder {
    command: ToolCommand,
    timeout: Option<Duration>,
}

/// Why streaming stopped early.
enum StreamFailure {
    /// The encoder closed its stdin.
    Closed { written: u64 },
    /// The frames violated the stream contract, or the transform failed.
    Abort(EncodeError),
}

impl Encoder {
    pub fn new(command: ToolCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    pub fn command(&self) -> &ToolCommand {
        &self.command
    }

    /// Encode `frames` with `params`, logging tool output to `logger`.
    pub fn encode(
        &self,
        params: &EncodeParams,
        frames: FrameSequence,
        logger: &Arc<JobLogger>,
    ) -> Result<EncodeOutput, EncodeError> {
        let tool = self.command.name();
        let args = params.args();
        let command_line = self.command.display_with(&args);
        logger.command(&command_line);

        if let Some(parent) = params.output().parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EncodeError::io("creating encoder output directory", e))?;
        }

        let mut cmd = self.command.command();
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let child = SupervisedChild::spawn(tool.clone(), &mut cmd, self.timeout)?;

        let drains = self.drain_output(&child, logger);
        let Some(stdin) = child.take_stdin() else {
            child.kill();
            join_all(drains);
            return Err(EncodeError::io(
                "opening encoder input",
                std::io::Error::new(ErrorKind::BrokenPipe, "stdin unavailable"),
            ));
        };

        let mut writer = BufWriter::new(stdin);
        let streamed = write_stream(&mut writer, params, frames);

        let written = match streamed {
            Ok(written) => {
                // Closing stdin is the end-of-stream signal.
                drop(writer);
                written
            }
            Err(StreamFailure::Abort(e)) => {
                // Kill before closing stdin so a short stream is never finalized.
                child.kill();
                drop(writer);
                join_all(drains);
                logger.show_tail(&tool);
                return Err(e);
            }
            Err(StreamFailure::Closed { written }) => {
                drop(writer);
                let status = child.wait();
                join_all(drains);
                logger.show_tail(&tool);
                return Err(match status {
                    Ok(status) if status.success() => EncodeError::InputClosed { tool, written },
                    Ok(status) => EncodeError::Failed {
                        exit_code: status.code().unwrap_or(-1),
                        message: tail_message(logger),
                        tool,
                    },
                    Err(e) => e.into(),
                });
            }
        };

        let status = child.wait();
        join_all(drains);
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                logger.show_tail(&tool);
                return Err(e.into());
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        if !status.success() {
            logger.show_tail(&tool);
            return Err(EncodeError::Failed {
                tool,
                exit_code,
                message: tail_message(logger),
            });
        }

        if !params.output().exists() {
            return Err(EncodeError::OutputMissing(params.output().to_path_buf()));
        }

        Ok(EncodeOutput {
            path: params.output().to_path_buf(),
            frames_written: written,
            exit_code,
            command: command_line,
        })
    }

    fn drain_output(&self, child: &SupervisedChild, logger: &Arc<JobLogger>) -> Vec<JoinHandle<()>> {
        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.take_stdout() {
            let logger = Arc::clone(logger);
            drains.push(spawn_line_drain(stdout, move |line| {
                logger.output_line(line, false)
            }));
        }
        if let Some(stderr) = child.take_stderr() {
            let logger = Arc::clone(logger);
            drains.push(spawn_line_drain(stderr, move |line| {
                logger.output_line(line, true)
            }));
        }
        drains
    }
}

/// Write the Y4M header and every frame, checking each against `params`.
fn write_stream(
    writer: &mut BufWriter<ChildStdin>,
    params: &EncodeParams,
    frames: FrameSequence,
) -> Result<u64, StreamFailure> {
    let meta = params.metadata();
    let expected_size = meta.frame_size();
    let expected_count = meta.frame_count;

    let header = Y4mHeader::from_metadata(meta).to_line();
    write_bytes(writer, header.as_bytes(), 0)?;

    let mut written: u64 = 0;
    for frame in frames {
        let frame = frame.map_err(|e| StreamFailure::Abort(EncodeError::Transform(e)))?;
        if written == expected_count {
            return Err(StreamFailure::Abort(EncodeError::FrameMismatch {
                expected: expected_count,
                actual: written + 1,
            }));
        }
        if frame.len() != expected_size {
            return Err(StreamFailure::Abort(EncodeError::FrameSize {
                index: written,
                expected: expected_size,
                actual: frame.len(),
            }));
        }

        write_bytes(writer, FRAME_HEADER, written)?;
        write_bytes(writer, &frame.data, written)?;
        written += 1;
    }

    if written != expected_count {
        return Err(StreamFailure::Abort(EncodeError::FrameMismatch {
            expected: expected_count,
            actual: written,
        }));
    }

    writer.flush().map_err(|e| classify_write_error(e, written))?;
    Ok(written)
}

fn write_bytes(
    writer: &mut BufWriter<ChildStdin>,
    data: &[u8],
    written: u64,
) -> Result<(), StreamFailure> {
    writer
        .write_all(data)
        .map_err(|e| classify_write_error(e, written))
}

fn classify_write_error(e: std::io::Error, written: u64) -> StreamFailure {
    if e.kind() == ErrorKind::BrokenPipe {
        StreamFailure::Closed { written }
    } else {
        StreamFailure::Abort(EncodeError::io("writing frames to encoder", e))
    }
}

fn tail_message(logger: &JobLogger) -> String {
    let tail = logger.get_tail();
    let start = tail.len().saturating_sub(MESSAGE_LINES);
    tail[start..].join("\n")
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::EncoderSettings;
    use crate::logging::LogConfig;
    use crate::test_support::{FakeTools, SyntheticTransform};
    use crate::transform::{TransformContext, VideoTransform};
    use std::path::Path;

    fn logger(dir: &Path) -> Arc<JobLogger> {
        Arc::new(JobLogger::new("00001", dir, LogConfig::default(), None).unwrap())
    }

    fn run(
        tools: &FakeTools,
        encoder: ToolCommand,
        transform: &SyntheticTransform,
        timeout: Option<Duration>,
    ) -> Result<EncodeOutput, EncodeError> {
        let context = TransformContext {
            clip_id: "00001".to_string(),
            work_dir: tools.dir().to_path_buf(),
            threads: 1,
        };
        let output = transform.transform(Path::new("unused"), &context).unwrap();
        let params = EncodeParams::from_metadata(
            &output.metadata,
            &EncoderSettings::default(),
            tools.dir().join("work").join("out.hevc"),
        )
        .unwrap();
        Encoder::new(encoder, timeout).encode(&params, output.frames, &logger(tools.dir()))
    }

    #[test]
    fn streams_every_frame_with_matching_flags() {
        let tools = FakeTools::new();
        let transform = SyntheticTransform::new(4, 2, 3);
        let result = run(&tools, tools.encoder(), &transform, None).unwrap();

        assert_eq!(result.frames_written, 3);
        assert_eq!(result.exit_code, 0);

        let stream = fs::read(&result.path).unwrap();
        let header = Y4mHeader::from_metadata(transform.metadata()).to_line();
        assert_eq!(stream.len(), header.len() + 3 * (FRAME_HEADER.len() + 12));
        assert!(stream.starts_with(b"YUV4MPEG2 W4 H2 F24:1"));

        let args = fs::read_to_string(result.path.with_extension("hevc.args")).unwrap();
        assert!(args.contains("--frames 3"));
        assert!(args.contains("--input-res 4x2"));
        assert!(args.contains("--fps 24/1"));
    }

    #[test]
    fn short_sequence_is_frame_mismatch() {
        let tools = FakeTools::new();
        let transform = SyntheticTransform::new(4, 2, 3).yielding(2);
        let err = run(&tools, tools.encoder(), &transform, None).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::FrameMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn long_sequence_is_frame_mismatch() {
        let tools = FakeTools::new();
        let transform = SyntheticTransform::new(4, 2, 3).yielding(5);
        let err = run(&tools, tools.encoder(), &transform, None).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::FrameMismatch {
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let tools = FakeTools::new();
        let transform = SyntheticTransform::new(4, 2, 3).with_frame_size(10);
        let err = run(&tools, tools.encoder(), &transform, None).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::FrameSize {
                index: 0,
                expected: 12,
                actual: 10
            }
        ));
    }

    #[test]
    fn encoder_failure_carries_exit_code() {
        let tools = FakeTools::new();
        let encoder = tools.script("encoder", "cat > /dev/null\necho 'x265 [error]: bad input' >&2\nexit 4");
        let transform = SyntheticTransform::new(4, 2, 3);
        let err = run(&tools, encoder, &transform, None).unwrap_err();
        match err {
            EncodeError::Failed {
                exit_code, message, ..
            } => {
                assert_eq!(exit_code, 4);
                assert!(message.contains("bad input"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn stalled_encoder_times_out() {
        let tools = FakeTools::new();
        let encoder = tools.script("encoder", "exec sleep 5");
        let transform = SyntheticTransform::new(4, 2, 3);
        let err = run(&tools, encoder, &transform, Some(Duration::from_millis(300))).unwrap_err();
        assert!(err.is_timeout());
    }
}
