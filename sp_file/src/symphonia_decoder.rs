//! Read-only decode for flac/mp3/aac/ogg/wav via `symphonia`.
//!
//! Grounded on `Bojan20-reelforge-standalone`'s `rf-offline::decoder`:
//! probe by extension, pick the first audio track, decode packet-by-packet.
//! Generalized from "decode the whole file up front" to one fixed-size
//! canonical block per `decode_block` call, buffering symphonia's
//! variable-length decoded packets in an internal ring so the pool only
//! ever sees `frames_per_block`-shaped buffers.

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use sp_core::pool::{AudioBuffer, BufferFormat, BufferPool, BufferShape, ChannelLayout};
use sp_graph::node::FileDecoder;

use crate::error::{FileError, Result};

fn layout_for(channels: usize) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::Mono,
        2 => ChannelLayout::Stereo,
        6 => ChannelLayout::Surround51,
        8 => ChannelLayout::Surround71,
        n => ChannelLayout::Custom(n),
    }
}

pub struct SymphoniaDecoder {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    frames_per_block: usize,
    pending: VecDeque<f32>,
    eof: bool,
}

impl SymphoniaDecoder {
    pub fn open(path: impl AsRef<Path>, frames_per_block: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| FileError::Open { path: path.display().to_string(), reason: e.to_string() })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| FileError::UnsupportedFormat { path: path.display().to_string() })?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| FileError::UnsupportedFormat { path: path.display().to_string() })?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params.sample_rate.unwrap_or(44_100);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| FileError::Decode { path: path.display().to_string(), reason: e.to_string() })?;

        Ok(Self { path, format, decoder, track_id, sample_rate, channels, frames_per_block, pending: VecDeque::new(), eof: false })
    }

    fn fill_pending(&mut self) -> Result<()> {
        while self.pending.len() < self.frames_per_block * self.channels && !self.eof {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.eof = true;
                    break;
                }
                Err(e) => return Err(FileError::Decode { path: self.path.display().to_string(), reason: e.to_string() }),
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(decoded) => append_interleaved(&decoded, self.channels, &mut self.pending),
                Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                Err(e) => return Err(FileError::Decode { path: self.path.display().to_string(), reason: e.to_string() }),
            }
        }
        Ok(())
    }
}

fn append_interleaved(decoded: &AudioBufferRef, channels: usize, out: &mut VecDeque<f32>) {
    macro_rules! push_plane {
        ($buf:expr, $convert:expr) => {{
            let planes = $buf.planes();
            let frames = $buf.frames();
            let planes = planes.planes();
            for frame in 0..frames {
                for ch in 0..channels.min(planes.len()) {
                    out.push_back($convert(planes[ch][frame]));
                }
            }
        }};
    }

    match decoded {
        AudioBufferRef::F32(buf) => push_plane!(buf, |s: f32| s),
        AudioBufferRef::F64(buf) => push_plane!(buf, |s: f64| s as f32),
        AudioBufferRef::S16(buf) => push_plane!(buf, |s: i16| s as f32 / 32_768.0),
        AudioBufferRef::S32(buf) => push_plane!(buf, |s: i32| s as f32 / 2_147_483_648.0),
        AudioBufferRef::S24(buf) => push_plane!(buf, |s: symphonia::core::sample::i24| s.inner() as f32 / 8_388_608.0),
        AudioBufferRef::U8(buf) => push_plane!(buf, |s: u8| (s as f32 - 128.0) / 128.0),
        AudioBufferRef::U16(buf) => push_plane!(buf, |s: u16| (s as f32 - 32_768.0) / 32_768.0),
        AudioBufferRef::U32(buf) => push_plane!(buf, |s: u32| (s as f32 - 2_147_483_648.0) / 2_147_483_648.0),
        AudioBufferRef::U24(buf) => push_plane!(buf, |s: symphonia::core::sample::u24| (s.inner() as f32 - 8_388_608.0) / 8_388_608.0),
        AudioBufferRef::S8(buf) => push_plane!(buf, |s: i8| s as f32 / 128.0),
    }
}

impl FileDecoder for SymphoniaDecoder {
    fn decode_block(&mut self, pool: &BufferPool) -> std::result::Result<Option<AudioBuffer>, String> {
        self.fill_pending().map_err(|e| e.to_string())?;
        if self.pending.is_empty() {
            return Ok(None);
        }

        let shape =
            BufferShape { format: BufferFormat::F32, layout: layout_for(self.channels), frames: self.frames_per_block, sample_rate: self.sample_rate };
        let mut buffer = pool.acquire(shape, true).map_err(|e| e.to_string())?;
        let plane = buffer.plane(0).map_err(|e| e.to_string())?;
        plane.fill(0);

        let wanted = self.frames_per_block * self.channels;
        for i in 0..wanted {
            let Some(sample) = self.pending.pop_front() else { break };
            plane[i * 4..i * 4 + 4].copy_from_slice(&sample.to_le_bytes());
        }
        Ok(Some(buffer))
    }
}
