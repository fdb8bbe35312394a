//! WAV decode/encode via `hound`, grounded on the teacher's own
//! `hound`-backed writer (`bbx_file::writers::wav`).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use sp_core::pool::{AudioBuffer, BufferFormat, BufferPool, BufferShape, ChannelLayout};
use sp_graph::node::{FileDecoder, FileEncoder};

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

/// Decodes a WAV file into fixed-size canonical f32 interleaved blocks of
/// `frames_per_block` frames, matching the running graph's block size. The
/// final block is zero-padded with silence rather than shrinking the
/// buffer shape, since the pool only holds buffers of one fixed shape per
/// bucket.
pub struct WavDecoder {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
    sample_rate: u32,
    channels: usize,
    float_samples: bool,
    bits_per_sample: u16,
    frames_per_block: usize,
}

impl WavDecoder {
    pub fn open(path: impl AsRef<Path>, frames_per_block: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(|e| FileError::Open { path: path.display().to_string(), reason: e.to_string() })?;
        let spec = reader.spec();
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels as usize,
            float_samples: spec.sample_format == SampleFormat::Float,
            bits_per_sample: spec.bits_per_sample,
            frames_per_block,
            reader,
            path,
        })
    }

    fn read_frame_samples(&mut self, count: usize) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(count);
        if self.float_samples {
            let mut samples = self.reader.samples::<f32>();
            for _ in 0..count {
                match samples.next() {
                    Some(Ok(s)) => out.push(s),
                    Some(Err(e)) => return Err(FileError::Decode { path: self.path.display().to_string(), reason: e.to_string() }),
                    None => break,
                }
            }
        } else {
            let full_scale = (1i64 << (self.bits_per_sample - 1)) as f32;
            let mut samples = self.reader.samples::<i32>();
            for _ in 0..count {
                match samples.next() {
                    Some(Ok(s)) => out.push(s as f32 / full_scale),
                    Some(Err(e)) => return Err(FileError::Decode { path: self.path.display().to_string(), reason: e.to_string() }),
                    None => break,
                }
            }
        }
        Ok(out)
    }
}

impl FileDecoder for WavDecoder {
    fn decode_block(&mut self, pool: &BufferPool) -> std::result::Result<Option<AudioBuffer>, String> {
        let samples = self.read_frame_samples(self.frames_per_block * self.channels).map_err(|e| e.to_string())?;
        if samples.is_empty() {
            return Ok(None);
        }

        let shape =
            BufferShape { format: BufferFormat::F32, layout: layout_for(self.channels), frames: self.frames_per_block, sample_rate: self.sample_rate };
        let mut buffer = pool.acquire(shape, true).map_err(|e| e.to_string())?;
        let plane = buffer.plane(0).map_err(|e| e.to_string())?;
        plane.fill(0);
        for (i, sample) in samples.iter().enumerate() {
            plane[i * 4..i * 4 + 4].copy_from_slice(&sample.to_le_bytes());
        }
        Ok(Some(buffer))
    }
}

/// Encodes canonical f32 interleaved blocks to 32-bit float WAV.
pub struct WavEncoder {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavEncoder {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, channels: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = WavSpec { channels: channels as u16, sample_rate, bits_per_sample: 32, sample_format: SampleFormat::Float };
        let writer = WavWriter::create(&path, spec).map_err(|e| FileError::Open { path: path.display().to_string(), reason: e.to_string() })?;
        Ok(Self { path, writer: Some(writer) })
    }
}

impl FileEncoder for WavEncoder {
    fn encode_block(&mut self, buffer: &AudioBuffer) -> std::result::Result<(), String> {
        let writer = self.writer.as_mut().ok_or("encoder already finalized")?;
        let plane = buffer.plane_ref(0).map_err(|e| e.to_string())?;
        let frames = buffer.shape().frames;
        let channels = buffer.shape().layout.channel_count();
        for i in 0..frames * channels {
            let offset = i * 4;
            if offset + 4 > plane.len() {
                break;
            }
            let sample = f32::from_le_bytes(plane[offset..offset + 4].try_into().unwrap());
            writer.write_sample(sample).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> std::result::Result<(), String> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| format!("{}: {e}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_core::pool::BufferPool;
    use tempfile::NamedTempFile;

    fn make_pool(shape: BufferShape) -> BufferPool {
        BufferPool::new().with_bucket(shape, true, 4)
    }

    #[test]
    fn round_trips_stereo_samples() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path();

        let shape = BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Stereo, frames: 4, sample_rate: 44_100 };
        let pool = make_pool(shape);
        let mut input = pool.acquire(shape, true).unwrap();
        let samples = [0.1f32, -0.1, 0.2, -0.2, 0.3, -0.3, 0.4, -0.4];
        {
            let plane = input.plane(0).unwrap();
            for (i, s) in samples.iter().enumerate() {
                plane[i * 4..i * 4 + 4].copy_from_slice(&s.to_le_bytes());
            }
        }

        let mut encoder = WavEncoder::create(path, 44_100, 2).unwrap();
        encoder.encode_block(&input).unwrap();
        encoder.finish().unwrap();

        let mut decoder = WavDecoder::open(path, 4).unwrap();
        let decode_pool = make_pool(BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Stereo, frames: 4, sample_rate: 44_100 });
        let block = decoder.decode_block(&decode_pool).unwrap().expect("one block of audio");
        let plane = block.plane_ref(0).unwrap();
        let decoded: Vec<f32> = (0..8).map(|i| f32::from_le_bytes(plane[i * 4..i * 4 + 4].try_into().unwrap())).collect();
        for (a, b) in decoded.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 1e-6);
        }

        assert!(decoder.decode_block(&decode_pool).unwrap().is_none());
    }

    #[test]
    fn short_final_block_is_zero_padded() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path();
        let shape = BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Mono, frames: 3, sample_rate: 44_100 };
        let pool = make_pool(shape);
        let mut input = pool.acquire(shape, true).unwrap();
        {
            let plane = input.plane(0).unwrap();
            for (i, s) in [1.0f32, 1.0, 1.0].iter().enumerate() {
                plane[i * 4..i * 4 + 4].copy_from_slice(&s.to_le_bytes());
            }
        }
        let mut encoder = WavEncoder::create(path, 44_100, 1).unwrap();
        encoder.encode_block(&input).unwrap();
        encoder.finish().unwrap();

        let mut decoder = WavDecoder::open(path, 8).unwrap();
        let decode_pool = make_pool(BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Mono, frames: 8, sample_rate: 44_100 });
        let block = decoder.decode_block(&decode_pool).unwrap().unwrap();
        let plane = block.plane_ref(0).unwrap();
        let decoded: Vec<f32> = (0..8).map(|i| f32::from_le_bytes(plane[i * 4..i * 4 + 4].try_into().unwrap())).collect();
        assert_eq!(&decoded[0..3], &[1.0, 1.0, 1.0]);
        assert_eq!(&decoded[3..8], &[0.0; 5]);
    }

    #[test]
    fn missing_file_reports_open_error() {
        let result = WavDecoder::open("/nonexistent/path/does-not-exist.wav", 256);
        assert!(result.is_err());
    }
}
