//! MP3 `FileSink` encode via `mp3lame-encoder`, grounded on spec scenario 4
//! (device_to_file with an mp3 FileSink) which names a bit-rate parameter.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mp3lame_encoder::{max_required_buffer_size, Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};

use sp_core::pool::AudioBuffer;
use sp_graph::node::FileEncoder;

use crate::error::{FileError, Result};

fn bitrate_from_kbps(kbps: u32) -> Bitrate {
    match kbps {
        0..=40 => Bitrate::Kbps32,
        41..=56 => Bitrate::Kbps48,
        57..=72 => Bitrate::Kbps64,
        73..=104 => Bitrate::Kbps96,
        105..=136 => Bitrate::Kbps128,
        137..=176 => Bitrate::Kbps160,
        177..=208 => Bitrate::Kbps192,
        209..=272 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

pub struct Mp3FileEncoder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    encoder: mp3lame_encoder::Encoder,
    channels: usize,
}

impl Mp3FileEncoder {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, channels: usize, bitrate_kbps: u32) -> Result<Self> {
        if channels != 1 && channels != 2 {
            return Err(FileError::UnsupportedChannelCount { channels });
        }

        let path = path.as_ref().to_path_buf();
        let mut builder = Builder::new().ok_or_else(|| FileError::Mp3Config("failed to create LAME builder".into()))?;
        builder.set_num_channels(channels as u8).map_err(|e| FileError::Mp3Config(e.to_string()))?;
        builder.set_sample_rate(sample_rate).map_err(|e| FileError::Mp3Config(e.to_string()))?;
        builder.set_brate(bitrate_from_kbps(bitrate_kbps)).map_err(|e| FileError::Mp3Config(e.to_string()))?;
        builder.set_quality(Quality::Good).map_err(|e| FileError::Mp3Config(e.to_string()))?;
        let encoder = builder.build().map_err(|e| FileError::Mp3Config(e.to_string()))?;

        let file = File::create(&path).map_err(|e| FileError::Open { path: path.display().to_string(), reason: e.to_string() })?;
        Ok(Self { path, writer: Some(BufWriter::new(file)), encoder, channels })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> std::result::Result<(), String> {
        let writer = self.writer.as_mut().ok_or("encoder already finalized")?;
        writer.write_all(bytes).map_err(|e| e.to_string())
    }
}

impl FileEncoder for Mp3FileEncoder {
    fn encode_block(&mut self, buffer: &AudioBuffer) -> std::result::Result<(), String> {
        let plane = buffer.plane_ref(0).map_err(|e| e.to_string())?;
        let frames = buffer.shape().frames;
        let samples: Vec<f32> = (0..frames * self.channels)
            .map(|i| {
                let offset = i * 4;
                f32::from_le_bytes(plane[offset..offset + 4].try_into().unwrap())
            })
            .collect();

        let mut out = Vec::with_capacity(max_required_buffer_size(frames));
        let encoded_size = if self.channels == 2 {
            let (mut left, mut right) = (Vec::with_capacity(frames), Vec::with_capacity(frames));
            for chunk in samples.chunks_exact(2) {
                left.push(chunk[0]);
                right.push(chunk[1]);
            }
            self.encoder.encode(DualPcm { left: &left, right: &right }, out.spare_capacity_mut()).map_err(|e| format!("{e:?}"))?
        } else {
            self.encoder.encode(MonoPcm(&samples), out.spare_capacity_mut()).map_err(|e| format!("{e:?}"))?
        };
        // SAFETY: `encode` guarantees `encoded_size` bytes of `out`'s spare
        // capacity were initialized.
        unsafe { out.set_len(encoded_size) };

        self.write_bytes(&out)
    }

    fn finish(&mut self) -> std::result::Result<(), String> {
        let mut out = Vec::with_capacity(max_required_buffer_size(0).max(7200));
        let encoded_size = self.encoder.flush::<FlushNoGap>(out.spare_capacity_mut()).map_err(|e| format!("{e:?}"))?;
        unsafe { out.set_len(encoded_size) };
        self.write_bytes(&out)?;

        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| format!("{}: {e}", self.path.display()))?;
        }
        Ok(())
    }
}
