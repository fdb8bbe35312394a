//! Error types shared by the engine's foundational primitives.
//!
//! This module provides a C-compatible error enum and a Result type alias
//! for use across all crates in the workspace.

use core::fmt;

/// Error codes for `sp_core` operations.
///
/// Uses `#[repr(C)]` for C-compatible memory layout, enabling FFI usage.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreError {
    /// No error occurred.
    Ok = 0,
    /// A null pointer was passed where a valid pointer was expected.
    NullPointer = 1,
    /// An invalid parameter value was provided.
    InvalidParameter = 2,
    /// An invalid buffer size was specified.
    InvalidBufferSize = 3,
    /// The graph has not been prepared for playback.
    GraphNotPrepared = 4,
    /// Memory allocation failed.
    AllocationFailed = 5,
    /// The buffer pool's free list for the requested (format, layout, frames)
    /// bucket was empty.
    PoolExhausted = 6,
    /// A conversion was requested between channel layouts that share no
    /// common semantic channel set (as opposed to merely a different order).
    IncompatibleLayout = 7,
    /// Mutable plane access was requested on a buffer whose ref count is > 1.
    BufferShared = 8,
    /// Sample rates on either side of a conversion did not match.
    SampleRateMismatch = 9,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Ok => write!(f, "no error"),
            CoreError::NullPointer => write!(f, "null pointer"),
            CoreError::InvalidParameter => write!(f, "invalid parameter"),
            CoreError::InvalidBufferSize => write!(f, "invalid buffer size"),
            CoreError::GraphNotPrepared => write!(f, "graph not prepared"),
            CoreError::AllocationFailed => write!(f, "allocation failed"),
            CoreError::PoolExhausted => write!(f, "buffer pool exhausted"),
            CoreError::IncompatibleLayout => write!(f, "incompatible channel layout"),
            CoreError::BufferShared => write!(f, "buffer has more than one reference"),
            CoreError::SampleRateMismatch => write!(f, "sample rate mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

/// Result type alias for `sp_core` operations.
pub type Result<T> = core::result::Result<T, CoreError>;
