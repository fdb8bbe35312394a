//! Shared execution context threaded through every node on each tick.

use sp_core::pool::{BufferFormat, ChannelLayout};

/// Canonical format and timing parameters negotiated once at engine
/// construction (see `sp_engine::engine` construction step 3) and held
/// immutable for the lifetime of a running graph.
#[derive(Debug, Clone)]
pub struct DspContext {
    pub sample_rate: u32,
    pub frames: usize,
    pub format: BufferFormat,
    pub channel_layout: ChannelLayout,
    pub current_sample: u64,
}

impl DspContext {
    pub fn new(sample_rate: u32, frames: usize, format: BufferFormat, channel_layout: ChannelLayout) -> Self {
        Self { sample_rate, frames, format, channel_layout, current_sample: 0 }
    }
}
