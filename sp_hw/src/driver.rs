//! The device driver interface `HardwareBridge` consumes.
//!
//! Treated as an opaque, externally-supplied collaborator per spec.md §6:
//! the bridge depends on this trait's shape, not on any concrete SDK. The
//! one shipped implementation is [`crate::backends::cpal::CpalDriver`].

/// One side of a duplex device: input channels are read, output channels
/// are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Negotiated device parameters, returned by `DeviceDriver::init`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSpec {
    pub sample_rate: u32,
    pub frames: usize,
    pub input_channels: usize,
    pub output_channels: usize,
}

/// `(min, max, granularity)` block-size limits the device will accept.
pub type BufferSizeLimits = (usize, usize, usize);

/// One callback invocation: the driver hands the bridge pointers to the
/// active half's channels for this block.
///
/// `direct_process_hint` is true when the driver guarantees in-place
/// processing is safe (no further buffering between this call and the
/// device); `sp_hw`'s cpal backend always reports `true` since it owns its
/// intermediate halves directly.
pub struct DriverCallbackArgs<'a> {
    pub half: usize,
    pub direct_process_hint: bool,
    pub input: &'a [&'a [f32]],
    pub output: &'a mut [&'a mut [f32]],
}

/// Notifications the driver may raise outside the regular callback cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverNotification {
    SampleRateChanged(u32),
    LatenciesChanged,
    ResetRequested,
}

pub type DriverCallback = Box<dyn FnMut(DriverCallbackArgs) + Send>;
pub type NotificationCallback = Box<dyn FnMut(DriverNotification) + Send>;

/// The consumed hardware driver SDK surface (spec.md §6, "Device driver").
pub trait DeviceDriver: Send {
    fn load(&mut self, device_name: &str) -> crate::error::Result<()>;

    fn init(&mut self, preferred_rate: u32, preferred_frames: usize) -> crate::error::Result<DeviceSpec>;

    fn channel_count(&self, direction: Direction) -> usize;

    fn buffer_size_limits(&self) -> BufferSizeLimits;

    fn sample_rate_supported(&self, rate: u32) -> bool;

    /// Allocate double buffers for exactly the requested channels and
    /// register the per-block callback. The driver starts invoking
    /// `callback` only after `start()`.
    fn create_buffers(
        &mut self,
        active_input_channels: Vec<usize>,
        active_output_channels: Vec<usize>,
        block_frames: usize,
        callback: DriverCallback,
    ) -> crate::error::Result<()>;

    fn start(&mut self) -> crate::error::Result<()>;

    fn stop(&mut self) -> crate::error::Result<()>;

    /// Register a sink for out-of-band driver notifications. Optional: the
    /// default implementation never notifies.
    fn on_notification(&mut self, _callback: NotificationCallback) {}
}
