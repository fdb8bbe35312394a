//! `FileSource`/`FileSink` decode/encode implementations for `sp_graph`.
//!
//! Each decoder/encoder here implements `sp_graph::node::{FileDecoder,
//! FileEncoder}`, the traits `sp_graph::node::FileSourceNode`/
//! `FileSinkNode` hold as `Box<dyn _>` so the graph crate never depends on
//! a specific container/codec stack.
//!
//! - WAV read/write: [`wav::WavDecoder`] / [`wav::WavEncoder`] via `hound`.
//! - Everything symphonia supports (flac/mp3/aac/ogg/wav) read-only:
//!   [`symphonia_decoder::SymphoniaDecoder`].
//! - MP3 write: [`mp3_encoder::Mp3FileEncoder`] via `mp3lame-encoder`.

pub mod error;
pub mod mp3_encoder;
pub mod symphonia_decoder;
pub mod wav;

pub use error::{FileError, Result};
