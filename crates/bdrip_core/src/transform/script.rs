//! Script transform run through a frameserver process.
//!
//! The frameserver (vspipe by default) is run twice per clip:
//! 1. `--info` to learn the output geometry, rate, format and frame count
//! 2. `--y4m` to stream the frames, which are read lazily from its stdout
//!
//! The script receives the source path and thread count as `--arg`
//! values, so nothing is passed through the environment.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ChildStdout, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::process::{run_captured, spawn_line_drain, SupervisedChild, ToolCommand};

use super::types::{
    ChromaFormat, StreamMetadata, TransformContext, TransformError, TransformOutput, VideoFrame,
    VideoTransform,
};
use super::y4m::Y4mReader;

/// Frameserver stderr lines kept for error messages.
const STDERR_TAIL: usize = 20;

/// Runs a user script through a frameserver.
#[derive(Debug, Clone)]
pub struct ScriptTransform {
    frameserver: ToolCommand,
    script: PathBuf,
    info_timeout: Option<Duration>,
    stream_timeout: Option<Duration>,
    name: String,
}

impl ScriptTransform {
    /// Create a transform running `script` with `frameserver`.
    pub fn new(frameserver: ToolCommand, script: impl Into<PathBuf>) -> Self {
        let script = script.into();
        let name = format!(
            "script:{}",
            script
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        );
        Self {
            frameserver,
            script,
            info_timeout: None,
            stream_timeout: None,
            name,
        }
    }

    /// Set deadlines for the info query and for the whole frame stream.
    pub fn with_timeouts(mut self, info: Option<Duration>, stream: Option<Duration>) -> Self {
        self.info_timeout = info;
        self.stream_timeout = stream;
        self
    }

    /// The user script.
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Arguments for the metadata query.
    pub fn info_args(&self, source: &Path, context: &TransformContext) -> Vec<String> {
        self.args("--info", source, context)
    }

    /// Arguments for streaming frames as Y4M on stdout.
    pub fn stream_args(&self, source: &Path, context: &TransformContext) -> Vec<String> {
        self.args("--y4m", source, context)
    }

    fn args(&self, mode: &str, source: &Path, context: &TransformContext) -> Vec<String> {
        vec![
            "--arg".to_string(),
            format!("source={}", source.display()),
            "--arg".to_string(),
            format!("threads={}", context.threads),
            mode.to_string(),
            self.script.display().to_string(),
            "-".to_string(),
        ]
    }

    fn query_info(
        &self,
        source: &Path,
        context: &TransformContext,
    ) -> Result<StreamMetadata, TransformError> {
        let tool = self.frameserver.name();
        let mut cmd = self.frameserver.command();
        cmd.args(self.info_args(source, context));

        let output = run_captured(&tool, &mut cmd, self.info_timeout)?;
        if !output.success() {
            return Err(TransformError::Failed {
                tool,
                exit_code: output.exit_code(),
                message: output.stderr_lossy().trim().to_string(),
            });
        }
        parse_info(&output.stdout_lossy())
    }
}

impl VideoTransform for ScriptTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(
        &self,
        source: &Path,
        context: &TransformContext,
    ) -> Result<TransformOutput, TransformError> {
        if !source.exists() {
            return Err(TransformError::SourceMissing(source.to_path_buf()));
        }

        let metadata = self.query_info(source, context)?;
        metadata.validate()?;
        tracing::debug!("[{}] {} reports {}", context.clip_id, self.name, metadata.summary());

        let tool = self.frameserver.name();
        let mut cmd = self.frameserver.command();
        cmd.args(self.stream_args(source, context))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = SupervisedChild::spawn(tool.clone(), &mut cmd, self.stream_timeout)?;
        let stdout = child
            .take_stdout()
            .ok_or_else(|| TransformError::Stream("frameserver stdout unavailable".to_string()))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL)));
        let drain = child.take_stderr().map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            let clip_id = context.clip_id.clone();
            spawn_line_drain(stderr, move |line| {
                tracing::debug!("[{}] frameserver: {}", clip_id, line);
                let mut tail = tail.lock();
                if tail.len() >= STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            })
        });

        let reader = Y4mReader::new(stdout)?;
        if !reader.header().matches(&metadata) {
            return Err(TransformError::InvalidMetadata(format!(
                "stream header ({}x{} @ {}/{}, {}-bit) disagrees with reported {}",
                reader.header().width,
                reader.header().height,
                reader.header().fps_num,
                reader.header().fps_den,
                reader.header().bits_per_sample,
                metadata.summary()
            )));
        }

        Ok(TransformOutput {
            metadata,
            frames: Box::new(ScriptFrames {
                reader,
                child: Some(child),
                tool,
                stderr_tail,
                drain,
            }),
        })
    }
}

/// Frames read from a running frameserver.
///
/// The process is reaped when the stream ends; dropping the sequence early
/// kills it.
struct ScriptFrames {
    reader: Y4mReader<ChildStdout>,
    child: Option<SupervisedChild>,
    tool: String,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    drain: Option<JoinHandle<()>>,
}

impl ScriptFrames {
    fn finish(&mut self) -> Option<Result<VideoFrame, TransformError>> {
        let child = self.child.take()?;
        let status = child.wait();
        if let Some(drain) = self.drain.take() {
            let _ = drain.join();
        }

        match status {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(TransformError::Failed {
                tool: self.tool.clone(),
                exit_code: status.code().unwrap_or(-1),
                message: self.stderr_message(),
            })),
            Err(e) => Some(Err(e.into())),
        }
    }

    fn stderr_message(&self) -> String {
        self.stderr_tail
            .lock()
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Iterator for ScriptFrames {
    type Item = Result<VideoFrame, TransformError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;
        match self.reader.next() {
            Some(Ok(frame)) => Some(Ok(frame)),
            // A killed frameserver shows up as a short read; report the deadline instead.
            Some(Err(_)) if self.child.as_ref().is_some_and(|c| c.timed_out()) => self.finish(),
            Some(Err(e)) => {
                if let Some(child) = self.child.take() {
                    child.kill();
                }
                Some(Err(e))
            }
            None => self.finish(),
        }
    }
}

/// Parse the frameserver's `--info` output.
///
/// ```text
/// Width: 1920
/// Height: 1080
/// Frames: 34095
/// FPS: 24000/1001 (23.976 fps)
/// Format Name: YUV420P10
/// Color Family: YUV
/// Bits: 10
/// SubSampling W: 1
/// SubSampling H: 1
/// ```
pub fn parse_info(text: &str) -> Result<StreamMetadata, TransformError> {
    let field = |key: &str| {
        text.lines().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            (k.trim() == key).then(|| v.trim().to_string())
        })
    };
    let required = |key: &str| {
        field(key).ok_or_else(|| {
            TransformError::InvalidMetadata(format!("frameserver info lacks {}", key))
        })
    };
    let number = |key: &str| -> Result<u64, TransformError> {
        let value = required(key)?;
        value.parse().map_err(|_| {
            TransformError::InvalidMetadata(format!("{} is not a number: {:?}", key, value))
        })
    };

    let dimension = |key: &str| -> Result<u32, TransformError> {
        let value = number(key)?;
        u32::try_from(value).map_err(|_| {
            TransformError::InvalidMetadata(format!("{} {} is out of range", key, value))
        })
    };

    let width = dimension("Width")?;
    let height = dimension("Height")?;
    let frame_count = number("Frames")?;

    let fps = required("FPS")?;
    let (fps_num, fps_den) = fps
        .split_whitespace()
        .next()
        .and_then(|r| r.split_once('/'))
        .and_then(|(n, d)| Some((n.parse().ok()?, d.parse().ok()?)))
        .ok_or_else(|| TransformError::InvalidMetadata(format!("unusable frame rate {:?}", fps)))?;

    let format_name = field("Format Name").unwrap_or_default().to_uppercase();
    let family = field("Color Family").unwrap_or_default().to_uppercase();

    let chroma = if family == "GRAY" || format_name.starts_with("GRAY") {
        ChromaFormat::Mono
    } else if family == "RGB" || format_name.starts_with("RGB") {
        return Err(TransformError::InvalidMetadata(
            "RGB output cannot be encoded; convert to YUV in the script".to_string(),
        ));
    } else {
        match (field("SubSampling W"), field("SubSampling H")) {
            (Some(w), Some(h)) => match (w.as_str(), h.as_str()) {
                ("1", "1") => ChromaFormat::Yuv420,
                ("1", "0") => ChromaFormat::Yuv422,
                ("0", "0") => ChromaFormat::Yuv444,
                _ => {
                    return Err(TransformError::InvalidMetadata(format!(
                        "unsupported subsampling {}x{}",
                        w, h
                    )))
                }
            },
            _ if format_name.contains("420") => ChromaFormat::Yuv420,
            _ if format_name.contains("422") => ChromaFormat::Yuv422,
            _ if format_name.contains("444") => ChromaFormat::Yuv444,
            _ => {
                return Err(TransformError::InvalidMetadata(format!(
                    "unknown output format {:?}",
                    format_name
                )))
            }
        }
    };

    let bits_per_sample = match field("Bits") {
        Some(bits) => bits.parse().map_err(|_| {
            TransformError::InvalidMetadata(format!("Bits is not a number: {:?}", bits))
        })?,
        None => format_name
            .rsplit_once('P')
            .and_then(|(_, bits)| bits.parse().ok())
            .unwrap_or(8),
    };

    Ok(StreamMetadata {
        width,
        height,
        fps_num,
        fps_den,
        bits_per_sample,
        chroma,
        frame_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = "Width: 1920\nHeight: 1080\nFrames: 34095\nFPS: 24000/1001 (23.976 fps)\n\
                        Format Name: YUV420P10\nColor Family: YUV\nAlpha: No\nSample Type: Integer\n\
                        Bits: 10\nSubSampling W: 1\nSubSampling H: 1\n";

    #[test]
    fn parses_info_output() {
        let meta = parse_info(INFO).unwrap();
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert_eq!(meta.frame_count, 34095);
        assert_eq!((meta.fps_num, meta.fps_den), (24000, 1001));
        assert_eq!(meta.bits_per_sample, 10);
        assert_eq!(meta.chroma, ChromaFormat::Yuv420);
    }

    #[test]
    fn falls_back_to_format_name() {
        let meta = parse_info("Width: 8\nHeight: 8\nFrames: 1\nFPS: 25/1\nFormat Name: YUV444P12\n")
            .unwrap();
        assert_eq!(meta.chroma, ChromaFormat::Yuv444);
        assert_eq!(meta.bits_per_sample, 12);

        let meta = parse_info("Width: 8\nHeight: 8\nFrames: 1\nFPS: 25/1\nColor Family: Gray\nBits: 16\n")
            .unwrap();
        assert_eq!(meta.chroma, ChromaFormat::Mono);
    }

    #[test]
    fn rejects_incomplete_info() {
        let err = parse_info("Width: 8\nHeight: 8\nFPS: 25/1\n").unwrap_err();
        assert!(err.to_string().contains("Frames"));
        assert!(parse_info("Width: 8\nHeight: 8\nFrames: 1\nFPS: Variable\n").is_err());
        assert!(parse_info("Width: 8\nHeight: 8\nFrames: 1\nFPS: 25/1\nColor Family: RGB\n").is_err());
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let err = parse_info("Width: 4294967297\nHeight: 8\nFrames: 1\nFPS: 25/1\n").unwrap_err();
        assert!(matches!(err, TransformError::InvalidMetadata(_)));
        assert!(err.to_string().contains("Width"));

        let err = parse_info("Width: 8\nHeight: 4294967296\nFrames: 1\nFPS: 25/1\n").unwrap_err();
        assert!(err.to_string().contains("Height"));
    }

    #[test]
    fn args_carry_source_and_threads() {
        let transform = ScriptTransform::new(ToolCommand::new("vspipe"), "/scripts/filter.vpy");
        let context = TransformContext {
            clip_id: "00001".to_string(),
            work_dir: PathBuf::from("/work/00001_build"),
            threads: 4,
        };
        assert_eq!(
            transform.stream_args(Path::new("/disc/00001.m2ts"), &context),
            vec![
                "--arg",
                "source=/disc/00001.m2ts",
                "--arg",
                "threads=4",
                "--y4m",
                "/scripts/filter.vpy",
                "-"
            ]
        );
        assert_eq!(transform.info_args(Path::new("/s"), &context)[4], "--info");
        assert_eq!(transform.name(), "script:filter.vpy");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::test_support::FakeTools;

        const FRAMESERVER: &str = r#"
for a in "$@"; do
  if [ "$a" = "--info" ]; then
    printf 'Width: 4\nHeight: 2\nFrames: 3\nFPS: 24/1 (24.000 fps)\nFormat Name: YUV420P8\nColor Family: YUV\nBits: 8\nSubSampling W: 1\nSubSampling H: 1\n'
    exit 0
  fi
done
printf 'YUV4MPEG2 W4 H2 F24:1 Ip A1:1 C420jpeg\n'
i=0
while [ $i -lt 3 ]; do
  printf 'FRAME\n'
  head -c 12 /dev/zero
  i=$((i+1))
done
echo "Output 3 frames" >&2
exit "${FAKE_EXIT:-0}"
"#;

        fn context(tools: &FakeTools) -> TransformContext {
            TransformContext {
                clip_id: "00001".to_string(),
                work_dir: tools.dir().to_path_buf(),
                threads: 1,
            }
        }

        #[test]
        fn streams_frames_from_frameserver() {
            let tools = FakeTools::new();
            let source = tools.touch("00001.m2ts");
            let script = tools.touch("filter.vpy");
            let transform = ScriptTransform::new(tools.script("vspipe", FRAMESERVER), &script)
                .with_timeouts(Some(Duration::from_secs(30)), Some(Duration::from_secs(30)));

            let output = transform.transform(&source, &context(&tools)).unwrap();
            assert_eq!(output.metadata.frame_count, 3);
            assert_eq!(output.metadata.frame_size(), 12);

            let frames: Vec<VideoFrame> = output.frames.map(|f| f.unwrap()).collect();
            assert_eq!(frames.len(), 3);
            assert!(frames.iter().all(|f| f.len() == 12));
        }

        #[test]
        fn failing_stream_reports_exit_code() {
            let tools = FakeTools::new();
            let source = tools.touch("00001.m2ts");
            let script = tools.touch("filter.vpy");
            let body = FRAMESERVER.replace("${FAKE_EXIT:-0}", "3");
            let transform = ScriptTransform::new(tools.script("vspipe", &body), &script);

            let output = transform.transform(&source, &context(&tools)).unwrap();
            let results: Vec<_> = output.frames.collect();
            assert_eq!(results.len(), 4);
            match results.last() {
                Some(Err(TransformError::Failed { exit_code, message, .. })) => {
                    assert_eq!(*exit_code, 3);
                    assert!(message.contains("Output 3 frames"));
                }
                other => panic!("unexpected {:?}", other.map(|r| r.is_ok())),
            }
        }

        #[test]
        fn info_failure_is_transform_error() {
            let tools = FakeTools::new();
            let source = tools.touch("00001.m2ts");
            let transform = ScriptTransform::new(tools.failing("vspipe", 1), "missing.vpy");

            let err = match transform.transform(&source, &context(&tools)) {
                Err(e) => e,
                Ok(_) => panic!("transform should fail"),
            };
            assert!(matches!(err, TransformError::Failed { exit_code: 1, .. }));
        }

        #[test]
        fn missing_source_is_reported() {
            let tools = FakeTools::new();
            let transform = ScriptTransform::new(tools.script("vspipe", FRAMESERVER), "x.vpy");
            let err = match transform.transform(&tools.dir().join("absent.m2ts"), &context(&tools)) {
                Err(e) => e,
                Ok(_) => panic!("transform should fail"),
            };
            assert!(matches!(err, TransformError::SourceMissing(_)));
        }
    }
}
