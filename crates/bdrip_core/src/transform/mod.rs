//! Video transform capability.
//!
//! A transform turns a source clip into stream metadata and a lazy frame
//! sequence. The encoder is configured from that metadata alone.

mod script;
mod types;
mod y4m;

pub use script::{parse_info, ScriptTransform};
pub use types::{
    ChromaFormat, FrameSequence, StreamMetadata, TransformContext, TransformError,
    TransformOutput, VideoFrame, VideoTransform,
};
pub use y4m::{chroma_tag, parse_chroma_tag, Y4mHeader, Y4mReader, FRAME_HEADER};
