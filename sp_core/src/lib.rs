//! # sp_core
//!
//! Foundational primitives shared by every crate in the workspace: the
//! [`Sample`] trait abstracting over `f32`/`f64`, the lock-free SPSC ring
//! buffer, the zero-allocation buffer pool, and sample-format conversion.

#![cfg_attr(feature = "simd", feature(portable_simd))]

pub mod buffer;
pub mod convert;
pub mod denormal;
pub mod error;
pub mod pool;
pub mod random;
pub mod sample;
#[cfg(feature = "simd")]
pub mod simd;
pub mod spsc;
pub mod stack_vec;

pub use buffer::Buffer;
pub use denormal::{flush_denormal_f32, flush_denormal_f64};
pub use error::{CoreError, Result};
pub use pool::{AudioBuffer, BufferFormat, BufferPool, ChannelLayout};
pub use sample::Sample;
pub use spsc::{Consumer, Producer, SpscRingBuffer};
pub use stack_vec::StackVec;
