//! Translates a driver-owned buffer-switch callback into a graph tick.
//!
//! Grounded on `bbx_player::backends::cpal`'s stream-setup sequence,
//! generalized into an explicit state machine (`Unloaded → DriverLoaded →
//! Initialized → BuffersReady → Running`) instead of one `play()` call, so
//! the engine can drive construction and teardown per spec.md §4.5/§4.6.

use crate::driver::{BufferSizeLimits, DeviceDriver, DeviceSpec, Direction, DriverCallback, NotificationCallback};
use crate::error::{HwError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unloaded,
    DriverLoaded,
    Initialized,
    BuffersReady,
    Running,
}

impl BridgeState {
    fn name(self) -> &'static str {
        match self {
            BridgeState::Unloaded => "Unloaded",
            BridgeState::DriverLoaded => "DriverLoaded",
            BridgeState::Initialized => "Initialized",
            BridgeState::BuffersReady => "BuffersReady",
            BridgeState::Running => "Running",
        }
    }
}

/// Owns a [`DeviceDriver`] and walks it through its lifecycle.
///
/// Any driver call that fails drops the bridge back to `Unloaded`; the
/// caller (the engine) is expected to surface that as `HardwareFault`.
pub struct HardwareBridge {
    driver: Box<dyn DeviceDriver>,
    state: BridgeState,
    spec: Option<DeviceSpec>,
}

impl HardwareBridge {
    pub fn new(driver: Box<dyn DeviceDriver>) -> Self {
        Self { driver, state: BridgeState::Unloaded, spec: None }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn spec(&self) -> Option<DeviceSpec> {
        self.spec
    }

    fn require(&self, expected: BridgeState) -> Result<()> {
        if self.state != expected {
            return Err(HwError::InvalidState { actual: self.state.name(), expected: expected.name() });
        }
        Ok(())
    }

    pub fn load(&mut self, device_name: &str) -> Result<()> {
        self.require(BridgeState::Unloaded)?;
        match self.driver.load(device_name) {
            Ok(()) => {
                self.state = BridgeState::DriverLoaded;
                Ok(())
            }
            Err(e) => {
                self.state = BridgeState::Unloaded;
                Err(e)
            }
        }
    }

    pub fn init(&mut self, preferred_rate: u32, preferred_frames: usize) -> Result<DeviceSpec> {
        self.require(BridgeState::DriverLoaded)?;
        match self.driver.init(preferred_rate, preferred_frames) {
            Ok(spec) => {
                self.spec = Some(spec);
                self.state = BridgeState::Initialized;
                Ok(spec)
            }
            Err(e) => {
                self.state = BridgeState::Unloaded;
                Err(e)
            }
        }
    }

    pub fn channel_count(&self, direction: Direction) -> usize {
        self.driver.channel_count(direction)
    }

    pub fn buffer_size_limits(&self) -> BufferSizeLimits {
        self.driver.buffer_size_limits()
    }

    pub fn create_buffers(
        &mut self,
        active_input_channels: Vec<usize>,
        active_output_channels: Vec<usize>,
        block_frames: usize,
        callback: DriverCallback,
    ) -> Result<()> {
        self.require(BridgeState::Initialized)?;
        match self.driver.create_buffers(active_input_channels, active_output_channels, block_frames, callback) {
            Ok(()) => {
                self.state = BridgeState::BuffersReady;
                Ok(())
            }
            Err(e) => {
                self.state = BridgeState::Unloaded;
                Err(e)
            }
        }
    }

    pub fn on_notification(&mut self, callback: NotificationCallback) {
        self.driver.on_notification(callback);
    }

    pub fn start(&mut self) -> Result<()> {
        self.require(BridgeState::BuffersReady)?;
        match self.driver.start() {
            Ok(()) => {
                self.state = BridgeState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = BridgeState::Unloaded;
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        self.require(BridgeState::Running)?;
        match self.driver.stop() {
            Ok(()) => {
                self.state = BridgeState::BuffersReady;
                Ok(())
            }
            Err(e) => {
                self.state = BridgeState::Unloaded;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeDriver {
        fail_on: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl DeviceDriver for FakeDriver {
        fn load(&mut self, _device_name: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some("load") { return Err(HwError::DeviceNotFound("fake".into())); }
            Ok(())
        }
        fn init(&mut self, preferred_rate: u32, preferred_frames: usize) -> Result<DeviceSpec> {
            if self.fail_on == Some("init") { return Err(HwError::InitFailed("fake".into())); }
            Ok(DeviceSpec { sample_rate: preferred_rate, frames: preferred_frames, input_channels: 2, output_channels: 2 })
        }
        fn channel_count(&self, _direction: Direction) -> usize { 2 }
        fn buffer_size_limits(&self) -> BufferSizeLimits { (32, 4096, 32) }
        fn sample_rate_supported(&self, _rate: u32) -> bool { true }
        fn create_buffers(&mut self, _i: Vec<usize>, _o: Vec<usize>, _f: usize, _cb: DriverCallback) -> Result<()> {
            if self.fail_on == Some("create_buffers") { return Err(HwError::BufferAllocationFailed("fake".into())); }
            Ok(())
        }
        fn start(&mut self) -> Result<()> { Ok(()) }
        fn stop(&mut self) -> Result<()> { Ok(()) }
    }

    fn bridge(fail_on: Option<&'static str>) -> HardwareBridge {
        HardwareBridge::new(Box::new(FakeDriver { fail_on, calls: Arc::new(AtomicUsize::new(0)) }))
    }

    #[test]
    fn walks_the_full_lifecycle() {
        let mut b = bridge(None);
        b.load("fake").unwrap();
        assert_eq!(b.state(), BridgeState::DriverLoaded);
        b.init(48_000, 256).unwrap();
        assert_eq!(b.state(), BridgeState::Initialized);
        b.create_buffers(vec![0, 1], vec![0, 1], 256, Box::new(|_| {})).unwrap();
        assert_eq!(b.state(), BridgeState::BuffersReady);
        b.start().unwrap();
        assert_eq!(b.state(), BridgeState::Running);
        b.stop().unwrap();
        assert_eq!(b.state(), BridgeState::BuffersReady);
    }

    #[test]
    fn rejects_out_of_order_transitions() {
        let mut b = bridge(None);
        let err = b.init(48_000, 256).unwrap_err();
        assert!(matches!(err, HwError::InvalidState { .. }));
    }

    #[test]
    fn failed_init_drops_back_to_unloaded() {
        let mut b = bridge(Some("init"));
        b.load("fake").unwrap();
        assert!(b.init(48_000, 256).is_err());
        assert_eq!(b.state(), BridgeState::Unloaded);
    }

    #[test]
    fn failed_create_buffers_drops_back_to_unloaded() {
        let mut b = bridge(Some("create_buffers"));
        b.load("fake").unwrap();
        b.init(48_000, 256).unwrap();
        assert!(b.create_buffers(vec![0], vec![0], 256, Box::new(|_| {})).is_err());
        assert_eq!(b.state(), BridgeState::Unloaded);
    }
}
