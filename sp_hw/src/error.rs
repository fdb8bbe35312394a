pub type Result<T> = std::result::Result<T, HwError>;

#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("no audio device named `{0}` was found")]
    DeviceNotFound(String),

    #[error("failed to initialize device: {0}")]
    InitFailed(String),

    #[error("device rejected sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("failed to allocate device buffers: {0}")]
    BufferAllocationFailed(String),

    #[error("device stream error: {0}")]
    StreamError(String),

    #[error("bridge is in state `{actual}`, which does not permit this operation (expected `{expected}`)")]
    InvalidState { actual: &'static str, expected: &'static str },
}
