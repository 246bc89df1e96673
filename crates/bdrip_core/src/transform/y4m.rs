//! YUV4MPEG2 stream framing.
//!
//! A stream is one header line (`YUV4MPEG2 W1920 H1080 F24000:1001 ... C420p10`)
//! followed by frames, each a `FRAME` line and the raw planar bytes.

use std::io::{BufRead, BufReader, ErrorKind, Read};

use super::types::{ChromaFormat, StreamMetadata, TransformError, VideoFrame};

const SIGNATURE: &str = "YUV4MPEG2";

/// Marker line written before every frame.
pub const FRAME_HEADER: &[u8] = b"FRAME\n";

/// Longest header or frame line accepted.
const MAX_LINE: usize = 4096;

/// Stream parameters carried by a Y4M header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Y4mHeader {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub chroma: ChromaFormat,
    pub bits_per_sample: u8,
}

impl Y4mHeader {
    /// Parse a header line (with or without the trailing newline).
    pub fn parse(line: &str) -> Result<Self, TransformError> {
        let mut tokens = line.trim_end().split(' ');
        if tokens.next() != Some(SIGNATURE) {
            return Err(TransformError::Stream(format!(
                "missing {} signature in {:?}",
                SIGNATURE, line
            )));
        }

        let mut width = None;
        let mut height = None;
        let mut rate = None;
        let mut chroma = (ChromaFormat::Yuv420, 8);

        for token in tokens.filter(|t| !t.is_empty()) {
            let Some((tag, value)) = token.split_at_checked(1) else {
                continue;
            };
            match tag {
                "W" => width = value.parse().ok(),
                "H" => height = value.parse().ok(),
                "F" => {
                    rate = value
                        .split_once(':')
                        .and_then(|(n, d)| Some((n.parse().ok()?, d.parse().ok()?)))
                }
                "C" => {
                    chroma = parse_chroma_tag(value).ok_or_else(|| {
                        TransformError::Stream(format!("unsupported colorspace C{}", value))
                    })?
                }
                _ => {}
            }
        }

        let (Some(width), Some(height), Some((fps_num, fps_den))) = (width, height, rate) else {
            return Err(TransformError::Stream(format!(
                "incomplete Y4M header {:?}",
                line.trim_end()
            )));
        };

        Ok(Self {
            width,
            height,
            fps_num,
            fps_den,
            chroma: chroma.0,
            bits_per_sample: chroma.1,
        })
    }

    /// Header describing `meta`.
    pub fn from_metadata(meta: &StreamMetadata) -> Self {
        Self {
            width: meta.width,
            height: meta.height,
            fps_num: meta.fps_num,
            fps_den: meta.fps_den,
            chroma: meta.chroma,
            bits_per_sample: meta.bits_per_sample,
        }
    }

    /// Metadata for a stream with this header and `frame_count` frames.
    pub fn to_metadata(&self, frame_count: u64) -> StreamMetadata {
        StreamMetadata {
            width: self.width,
            height: self.height,
            fps_num: self.fps_num,
            fps_den: self.fps_den,
            bits_per_sample: self.bits_per_sample,
            chroma: self.chroma,
            frame_count,
        }
    }

    /// Whether geometry, rate and sample format agree with `meta`.
    pub fn matches(&self, meta: &StreamMetadata) -> bool {
        *self == Self::from_metadata(meta)
    }

    /// Header line including the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{} W{} H{} F{}:{} Ip A1:1 C{}\n",
            SIGNATURE,
            self.width,
            self.height,
            self.fps_num,
            self.fps_den,
            chroma_tag(self.chroma, self.bits_per_sample)
        )
    }
}

/// Colorspace tag for the `C` header field.
pub fn chroma_tag(chroma: ChromaFormat, bits: u8) -> String {
    let base = match chroma {
        ChromaFormat::Yuv420 => "420",
        ChromaFormat::Yuv422 => "422",
        ChromaFormat::Yuv444 => "444",
        ChromaFormat::Mono => "mono",
    };
    match (chroma, bits) {
        (ChromaFormat::Yuv420, 8) => "420jpeg".to_string(),
        (_, 8) => base.to_string(),
        (ChromaFormat::Mono, bits) => format!("mono{}", bits),
        (_, bits) => format!("{}p{}", base, bits),
    }
}

/// Parse a `C` header field value into chroma format and bit depth.
pub fn parse_chroma_tag(tag: &str) -> Option<(ChromaFormat, u8)> {
    if let Some(rest) = tag.strip_prefix("mono") {
        return match rest {
            "" => Some((ChromaFormat::Mono, 8)),
            bits => bits.parse().ok().map(|b| (ChromaFormat::Mono, b)),
        };
    }

    let chroma = match tag.get(..3)? {
        "420" => ChromaFormat::Yuv420,
        "422" => ChromaFormat::Yuv422,
        "444" => ChromaFormat::Yuv444,
        _ => return None,
    };
    match &tag[3..] {
        "" | "jpeg" | "mpeg2" | "paldv" => Some((chroma, 8)),
        rest => rest
            .strip_prefix('p')
            .and_then(|bits| bits.parse().ok())
            .map(|bits| (chroma, bits)),
    }
}

/// Lazy frame reader over a Y4M byte stream.
pub struct Y4mReader<R> {
    reader: BufReader<R>,
    header: Y4mHeader,
    frame_size: usize,
    done: bool,
}

impl<R: Read> Y4mReader<R> {
    /// Read the stream header from `reader`.
    pub fn new(reader: R) -> Result<Self, TransformError> {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        if read_line(&mut reader, &mut line)? == 0 {
            return Err(TransformError::Stream(
                "stream ended before the Y4M header".to_string(),
            ));
        }
        let header = Y4mHeader::parse(&String::from_utf8_lossy(&line))?;
        let frame_size = header.to_metadata(1).frame_size();

        Ok(Self {
            reader,
            header,
            frame_size,
            done: false,
        })
    }

    /// The parsed stream header.
    pub fn header(&self) -> &Y4mHeader {
        &self.header
    }

    /// Bytes in each frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Read the next frame; `Ok(None)` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<VideoFrame>, TransformError> {
        let mut line = Vec::new();
        if read_line(&mut self.reader, &mut line)? == 0 {
            return Ok(None);
        }
        if !line.starts_with(b"FRAME") {
            return Err(TransformError::Stream(format!(
                "expected FRAME marker, found {:?}",
                String::from_utf8_lossy(&line[..line.len().min(32)])
            )));
        }

        let mut data = vec![0u8; self.frame_size];
        self.reader.read_exact(&mut data).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                TransformError::Stream("stream ended inside a frame".to_string())
            }
            _ => TransformError::Io(e),
        })?;
        Ok(Some(VideoFrame::new(data)))
    }
}

impl<R: Read> Iterator for Y4mReader<R> {
    type Item = Result<VideoFrame, TransformError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read one `\n`-terminated line (newline stripped), bounded by `MAX_LINE`.
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<usize, TransformError> {
    let n = reader
        .by_ref()
        .take(MAX_LINE as u64)
        .read_until(b'\n', line)?;
    if n == MAX_LINE && line.last() != Some(&b'\n') {
        return Err(TransformError::Stream("Y4M line too long".to_string()));
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Y4mHeader {
        Y4mHeader {
            width: 4,
            height: 2,
            fps_num: 24000,
            fps_den: 1001,
            chroma: ChromaFormat::Yuv420,
            bits_per_sample: 10,
        }
    }

    fn stream(frames: &[u8]) -> Vec<u8> {
        let h = header();
        let size = h.to_metadata(1).frame_size();
        let mut data = h.to_line().into_bytes();
        for &fill in frames {
            data.extend_from_slice(FRAME_HEADER);
            data.extend(std::iter::repeat(fill).take(size));
        }
        data
    }

    #[test]
    fn header_line_format() {
        assert_eq!(
            header().to_line(),
            "YUV4MPEG2 W4 H2 F24000:1001 Ip A1:1 C420p10\n"
        );
        assert_eq!(Y4mHeader::parse(&header().to_line()).unwrap(), header());
    }

    #[test]
    fn parses_foreign_header() {
        let h = Y4mHeader::parse("YUV4MPEG2 W1920 H1080 F25:1 It A0:0 C422 XYSCSS=422").unwrap();
        assert_eq!(h.width, 1920);
        assert_eq!(h.chroma, ChromaFormat::Yuv422);
        assert_eq!(h.bits_per_sample, 8);

        let h = Y4mHeader::parse("YUV4MPEG2 W8 H8 F30000:1001").unwrap();
        assert_eq!(h.chroma, ChromaFormat::Yuv420);

        assert!(Y4mHeader::parse("YUV4MPEG2 W8 F1:1").is_err());
        assert!(Y4mHeader::parse("RIFF W8 H8 F1:1").is_err());
        assert!(Y4mHeader::parse("YUV4MPEG2 W8 H8 F1:1 C411").is_err());
    }

    #[test]
    fn chroma_tags() {
        assert_eq!(chroma_tag(ChromaFormat::Yuv420, 8), "420jpeg");
        assert_eq!(chroma_tag(ChromaFormat::Yuv444, 12), "444p12");
        assert_eq!(chroma_tag(ChromaFormat::Mono, 16), "mono16");
        assert_eq!(parse_chroma_tag("420paldv"), Some((ChromaFormat::Yuv420, 8)));
        assert_eq!(parse_chroma_tag("422p10"), Some((ChromaFormat::Yuv422, 10)));
        assert_eq!(parse_chroma_tag("mono"), Some((ChromaFormat::Mono, 8)));
        assert_eq!(parse_chroma_tag("4"), None);
    }

    #[test]
    fn reads_frames_lazily() {
        let data = stream(&[1, 2, 3]);
        let reader = Y4mReader::new(data.as_slice()).unwrap();
        assert_eq!(reader.frame_size(), 24);

        let frames: Vec<VideoFrame> = reader.map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        assert!(frames[1].data.iter().all(|&b| b == 2));
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let data = stream(&[1, 2]);
        let mut reader = Y4mReader::new(&data[..data.len() - 3]).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(reader.next(), Some(Err(TransformError::Stream(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn empty_stream_has_no_header() {
        assert!(Y4mReader::new(&b""[..]).is_err());
    }

    #[test]
    fn header_matches_metadata() {
        let meta = header().to_metadata(5);
        assert!(header().matches(&meta));
        let mut other = meta.clone();
        other.bits_per_sample = 8;
        assert!(!header().matches(&other));
    }
}
