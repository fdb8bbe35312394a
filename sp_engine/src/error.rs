//! Aggregates every per-crate error into the taxonomy spec.md §7 describes
//! (Configuration/Device/Pool/Filter/File/Parameter/Transport), the way a
//! top-level crate wraps its collaborators' errors via `#[from]`.

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no node named `{0}`")]
    UnknownNode(String),

    #[error("node `{0}` is not a filter_processor node")]
    NotAFilter(String),

    #[error(transparent)]
    Graph(#[from] sp_graph::error::GraphError),

    #[error(transparent)]
    Core(#[from] sp_core::error::CoreError),

    #[error(transparent)]
    File(#[from] sp_file::error::FileError),

    #[error(transparent)]
    Net(#[from] sp_net::error::NetError),

    #[error(transparent)]
    Hardware(#[from] sp_hw::error::HwError),
}
