//! Device driver bridge: translates a driver-owned buffer-switch callback
//! into a graph tick.
//!
//! - [`driver::DeviceDriver`] is the consumed hardware SDK surface (spec.md
//!   §6), treated as an opaque collaborator.
//! - [`backends::cpal::CpalDriver`] is the one shipped implementation.
//! - [`bridge::HardwareBridge`] walks the driver through
//!   `Unloaded → DriverLoaded → Initialized → BuffersReady → Running`
//!   (spec.md §4.5) and forwards driver-reported faults.

pub mod backends;
pub mod bridge;
pub mod driver;
pub mod error;

pub use bridge::{BridgeState, HardwareBridge};
pub use driver::{DeviceDriver, DeviceSpec, Direction, DriverCallbackArgs, DriverNotification};
pub use error::{HwError, Result};
