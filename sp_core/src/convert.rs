//! Sample-format and channel-layout conversion between pooled buffers.
//!
//! Converters never allocate: callers provide the destination `AudioBuffer`
//! (acquired from the pool ahead of time) and this module only reads source
//! planes and writes destination planes.

use crate::error::{CoreError, Result};
use crate::pool::{AudioBuffer, BufferFormat, ChannelLayout};

/// Convert one interleaved plane from `src_format` to `dst_format`, sample
/// by sample, using full-scale integer<->float mapping.
pub fn convert_samples(src: &[u8], src_format: BufferFormat, dst: &mut [u8], dst_format: BufferFormat) -> Result<()> {
    let src_count = src.len() / src_format.bytes_per_sample();
    let dst_count = dst.len() / dst_format.bytes_per_sample();
    if src_count != dst_count {
        return Err(CoreError::InvalidBufferSize);
    }

    for i in 0..src_count {
        let value = read_f64(src, src_format, i);
        write_f64(dst, dst_format, i, value);
    }
    Ok(())
}

fn read_f64(buf: &[u8], format: BufferFormat, index: usize) -> f64 {
    match format {
        BufferFormat::S16 => {
            let off = index * 2;
            let raw = i16::from_le_bytes([buf[off], buf[off + 1]]);
            raw as f64 / i16::MAX as f64
        }
        BufferFormat::S24In32 => {
            let off = index * 4;
            let raw = i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
            // Only the low 24 bits carry signal; sign-extend from bit 23.
            let shifted = (raw << 8) >> 8;
            shifted as f64 / 8_388_607.0
        }
        BufferFormat::S32 => {
            let off = index * 4;
            let raw = i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
            raw as f64 / i32::MAX as f64
        }
        BufferFormat::F32 => {
            let off = index * 4;
            f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]) as f64
        }
        BufferFormat::F64 => {
            let off = index * 8;
            f64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
        }
    }
}

fn write_f64(buf: &mut [u8], format: BufferFormat, index: usize, value: f64) {
    match format {
        BufferFormat::S16 => {
            let off = index * 2;
            let raw = (value.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16;
            buf[off..off + 2].copy_from_slice(&raw.to_le_bytes());
        }
        BufferFormat::S24In32 => {
            let off = index * 4;
            let raw = (value.clamp(-1.0, 1.0) * 8_388_607.0).round() as i32;
            buf[off..off + 4].copy_from_slice(&raw.to_le_bytes());
        }
        BufferFormat::S32 => {
            let off = index * 4;
            let raw = (value.clamp(-1.0, 1.0) * i32::MAX as f64).round() as i32;
            buf[off..off + 4].copy_from_slice(&raw.to_le_bytes());
        }
        BufferFormat::F32 => {
            let off = index * 4;
            buf[off..off + 4].copy_from_slice(&(value as f32).to_le_bytes());
        }
        BufferFormat::F64 => {
            let off = index * 8;
            buf[off..off + 8].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// Map source channel index to destination channel index for a layout
/// conversion. Returns `None` for a destination channel with no source
/// counterpart (e.g. expanding mono to stereo duplicates channel 0).
///
/// Layouts with the same channel count are assumed already in matching
/// order (both follow the SMPTE/ITU channel ordering convention used
/// throughout this workspace); layouts with a different channel count are
/// only convertible along the documented up/down-mix paths.
pub fn channel_map(src: ChannelLayout, dst: ChannelLayout) -> Result<Vec<usize>> {
    use ChannelLayout::*;
    match (src, dst) {
        (a, b) if a == b => Ok((0..a.channel_count()).collect()),
        (Mono, Stereo) => Ok(vec![0, 0]),
        (Stereo, Mono) => Ok(vec![0]),
        _ => Err(CoreError::IncompatibleLayout),
    }
}

/// Convert `src` into `dst`, performing format conversion and, when the
/// layouts differ, channel mapping. Both buffers must already have matching
/// frame counts and sample rates.
pub fn convert_buffer(src: &AudioBuffer, dst: &mut AudioBuffer) -> Result<()> {
    if src.shape().sample_rate != dst.shape().sample_rate {
        return Err(CoreError::SampleRateMismatch);
    }
    if src.shape().frames != dst.shape().frames {
        return Err(CoreError::InvalidBufferSize);
    }

    let map = channel_map(src.shape().layout, dst.shape().layout)?;
    let src_format = src.shape().format;
    let dst_format = dst.shape().format;

    for (dst_ch, &src_ch) in map.iter().enumerate() {
        let src_plane = src.plane_ref(src_ch)?;
        let dst_plane = dst.plane(dst_ch)?;
        convert_samples(src_plane, src_format, dst_plane, dst_format)?;
    }
    Ok(())
}
