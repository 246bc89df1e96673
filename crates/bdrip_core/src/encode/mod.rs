//! Video encoding through an external encoder process.
//!
//! - **params**: `EncodeParams`, derived only from transform metadata
//! - **encoder**: streams a frame sequence into the encoder's stdin

mod encoder;
mod params;
mod types;

pub use encoder::Encoder;
pub use params::EncodeParams;
pub use types::{EncodeError, EncodeOutput};
