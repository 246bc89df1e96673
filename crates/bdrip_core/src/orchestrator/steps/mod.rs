//! Pipeline step implementations.
//!
//! Each step handles one phase of ripping a clip.

mod encode;
mod mux;
mod probe;

pub use encode::{EncodeStep, ENCODED_FILE_NAME};
pub use mux::MuxStep;
pub use probe::ProbeStep;
