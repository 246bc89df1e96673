//! Shared fixtures for unit tests: synthetic playlists, fake external tools
//! and in-memory transforms.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::Settings;
use crate::process::ToolCommand;
use crate::transform::{
    ChromaFormat, StreamMetadata, TransformContext, TransformError, TransformOutput, VideoFrame,
    VideoTransform,
};
use crate::ClipId;

const HEADER_LEN: usize = 40;
/// AppInfoPlayList: length u32, then reserved, playback type/count, UO mask, flags.
const APP_INFO_LEN: usize = 4 + 14;

/// Builds binary movie playlists in memory.
#[derive(Debug, Clone, Default)]
pub struct MplsBuilder {
    items: Vec<(String, u32, u32)>,
    marks: Vec<(u8, u16, u32)>,
    item_padding: usize,
}

impl MplsBuilder {
    /// Offset of the first play item's clip name in built data.
    pub const FIRST_CLIP_NAME_OFFSET: usize = HEADER_LEN + APP_INFO_LEN + 10 + 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a play item referencing `clip` (at most 5 characters).
    pub fn play_item(mut self, clip: &str, in_time: u32, out_time: u32) -> Self {
        self.items.push((clip.to_string(), in_time, out_time));
        self
    }

    /// Add an entry (chapter) mark.
    pub fn chapter(self, play_item: u16, timestamp: u32) -> Self {
        self.mark(1, play_item, timestamp)
    }

    /// Add a mark of any type.
    pub fn mark(mut self, mark_type: u8, play_item: u16, timestamp: u32) -> Self {
        self.marks.push((mark_type, play_item, timestamp));
        self
    }

    /// Append `n` unused bytes to every play item body.
    pub fn with_item_padding(mut self, n: usize) -> Self {
        self.item_padding = n;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut items = Vec::new();
        for (clip, in_time, out_time) in &self.items {
            let mut body = Vec::new();
            let mut name = clip.as_bytes().to_vec();
            name.resize(5, 0);
            body.extend_from_slice(&name[..5]);
            body.extend_from_slice(b"M2TS");
            body.extend_from_slice(&0u16.to_be_bytes());
            body.push(0);
            body.extend_from_slice(&in_time.to_be_bytes());
            body.extend_from_slice(&out_time.to_be_bytes());
            // UO mask, random access flag, still mode and still time.
            body.extend_from_slice(&[0; 8 + 1 + 3]);
            // Empty stream number table.
            body.extend_from_slice(&14u16.to_be_bytes());
            body.extend_from_slice(&[0; 14]);
            body.extend(std::iter::repeat(0).take(self.item_padding));

            items.extend_from_slice(&(body.len() as u16).to_be_bytes());
            items.extend_from_slice(&body);
        }

        let mut playlist = Vec::new();
        playlist.extend_from_slice(&((6 + items.len()) as u32).to_be_bytes());
        playlist.extend_from_slice(&0u16.to_be_bytes());
        playlist.extend_from_slice(&(self.items.len() as u16).to_be_bytes());
        playlist.extend_from_slice(&0u16.to_be_bytes());
        playlist.extend_from_slice(&items);

        let mut marks = Vec::new();
        marks.extend_from_slice(&((2 + 14 * self.marks.len()) as u32).to_be_bytes());
        marks.extend_from_slice(&(self.marks.len() as u16).to_be_bytes());
        for (mark_type, play_item, timestamp) in &self.marks {
            marks.push(0);
            marks.push(*mark_type);
            marks.extend_from_slice(&play_item.to_be_bytes());
            marks.extend_from_slice(&timestamp.to_be_bytes());
            marks.extend_from_slice(&0xFFFFu16.to_be_bytes());
            marks.extend_from_slice(&0u32.to_be_bytes());
        }

        let playlist_start = (HEADER_LEN + APP_INFO_LEN) as u32;
        let mark_start = playlist_start + playlist.len() as u32;

        let mut data =
            Vec::with_capacity(HEADER_LEN + APP_INFO_LEN + playlist.len() + marks.len());
        data.extend_from_slice(b"MPLS0200");
        data.extend_from_slice(&playlist_start.to_be_bytes());
        data.extend_from_slice(&mark_start.to_be_bytes());
        data.resize(HEADER_LEN, 0);
        data.extend_from_slice(&14u32.to_be_bytes());
        data.extend_from_slice(&[0, 1]);
        data.resize(HEADER_LEN + APP_INFO_LEN, 0);
        data.extend_from_slice(&playlist);
        data.extend_from_slice(&marks);
        data
    }

    pub fn write_to(&self, path: &Path) {
        fs::write(path, self.build()).unwrap();
    }
}

/// Scratch directory holding fake external tools as `sh` scripts.
pub struct FakeTools {
    dir: TempDir,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Create an empty file in the scratch directory.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"").unwrap();
        path
    }

    /// Write `body` as a script and return a command running it through `sh`.
    pub fn script(&self, name: &str, body: &str) -> ToolCommand {
        let path = self.dir().join(format!("{}.sh", name));
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        ToolCommand::new("sh").with_args([path.display().to_string()])
    }

    /// Tool that prints a message on stderr and exits with `code`.
    pub fn failing(&self, name: &str, code: i32) -> ToolCommand {
        self.script(
            name,
            &format!("echo \"{}: simulated failure\" >&2\nexit {}", name, code),
        )
    }

    /// Prober reporting one video and one audio stream.
    pub fn prober(&self) -> ToolCommand {
        self.script(
            "prober",
            r#"cat <<'EOF'
{"streams": [
  {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "24000/1001"},
  {"index": 1, "codec_type": "audio", "codec_name": "truehd", "channels": 8, "sample_rate": "48000", "tags": {"language": "eng"}}
]}
EOF"#,
        )
    }

    /// Encoder that copies its stdin to `--output` and its arguments to `<output>.args`.
    pub fn encoder(&self) -> ToolCommand {
        self.script(
            "encoder",
            r#"args="$*"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; shift; fi
  shift
done
echo "$args" > "$out.args"
cat > "$out"
echo "encoded" >&2"#,
        )
    }

    /// Muxer that writes its arguments, one per line, into the `-o` file.
    pub fn muxer(&self) -> ToolCommand {
        self.script(
            "muxer",
            r#"out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
printf '%s\n' "$@" > "$out"
echo "Multiplexing took 0 seconds.""#,
        )
    }

    /// Settings wired to the fake prober, encoder and muxer.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.tools.prober = self.prober();
        settings.tools.encoder = self.encoder();
        settings.tools.muxer = self.muxer();
        settings.encoder.threads = 2;
        settings.timeouts.probe_secs = 30;
        settings.timeouts.encode_secs = 30;
        settings.timeouts.mux_secs = 30;
        settings
    }
}

/// In-memory transform yielding deterministic frames.
#[derive(Debug, Clone)]
pub struct SyntheticTransform {
    metadata: StreamMetadata,
    yield_frames: u64,
    frame_size: usize,
    fail_for: Vec<ClipId>,
}

impl SyntheticTransform {
    /// `frames` 8-bit 4:2:0 frames of `width`x`height` at 24 fps.
    pub fn new(width: u32, height: u32, frames: u64) -> Self {
        let metadata = StreamMetadata {
            width,
            height,
            fps_num: 24,
            fps_den: 1,
            bits_per_sample: 8,
            chroma: ChromaFormat::Yuv420,
            frame_count: frames,
        };
        Self {
            frame_size: metadata.frame_size(),
            yield_frames: frames,
            metadata,
            fail_for: Vec::new(),
        }
    }

    /// Fail `transform` for this clip.
    pub fn failing_for(mut self, clip_id: &str) -> Self {
        self.fail_for.push(clip_id.to_string());
        self
    }

    /// Yield `n` frames regardless of the reported count.
    pub fn yielding(mut self, n: u64) -> Self {
        self.yield_frames = n;
        self
    }

    /// Yield frames of `size` bytes regardless of the reported format.
    pub fn with_frame_size(mut self, size: usize) -> Self {
        self.frame_size = size;
        self
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }
}

impl VideoTransform for SyntheticTransform {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn transform(
        &self,
        _source: &Path,
        context: &TransformContext,
    ) -> Result<TransformOutput, TransformError> {
        if self.fail_for.contains(&context.clip_id) {
            return Err(TransformError::Custom(format!(
                "synthetic failure for {}",
                context.clip_id
            )));
        }

        let size = self.frame_size;
        let frames = (0..self.yield_frames)
            .map(move |i| Ok::<_, TransformError>(VideoFrame::new(vec![(i % 256) as u8; size])));
        Ok(TransformOutput {
            metadata: self.metadata.clone(),
            frames: Box::new(frames),
        })
    }
}
