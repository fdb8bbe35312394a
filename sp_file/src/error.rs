pub type Result<T> = std::result::Result<T, FileError>;

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("failed to open `{path}`: {reason}")]
    Open { path: String, reason: String },

    #[error("unrecognized or unsupported container/codec for `{path}`")]
    UnsupportedFormat { path: String },

    #[error("decode error in `{path}`: {reason}")]
    Decode { path: String, reason: String },

    #[error("encode error writing `{path}`: {reason}")]
    Encode { path: String, reason: String },

    #[error("mp3 encoder only supports mono or stereo, got {channels} channels")]
    UnsupportedChannelCount { channels: usize },

    #[error("mp3 encoder rejected configuration: {0}")]
    Mp3Config(String),
}
