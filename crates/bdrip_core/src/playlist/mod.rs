//! Playlist decoding.
//!
//! A playlist lists the play items (clip segments) of one title and the
//! marks placed on them. Chapter extraction consumes the decoded
//! `PlaylistRecord` through the `PlaylistParser` trait; `MplsParser` is the
//! built-in decoder for `.mpls` files, backed by the `mpls` crate.

mod decoder;
mod types;

pub use decoder::MplsParser;
pub use types::{
    MarkType, PlayItem, PlaylistError, PlaylistMark, PlaylistParser, PlaylistRecord,
    PlaylistResult, DISC_CLOCK_HZ,
};
