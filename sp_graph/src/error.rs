pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("node name `{0}` is not unique")]
    DuplicateNodeName(String),

    #[error("connection references unknown node `{0}`")]
    UnknownNode(String),

    #[error("connection references pad {pad} on node `{node}`, which only has {count} pads")]
    UnknownPad { node: String, pad: usize, count: usize },

    #[error("sink pad {pad} on node `{node}` already has an incoming connection")]
    PadAlreadyConnected { node: String, pad: usize },

    #[error("source pad {pad} on node `{node}` already has a `Move` connection; fan-out requires `SharedRef`")]
    DuplicateMoveConnection { node: String, pad: usize },

    #[error("connection from `{0}` to itself is not permitted")]
    SelfLoop(String),

    #[error("graph contains a cycle reachable from `{0}` and `{1}`")]
    Cycle(String, String),

    #[error("node `{node}` rejected configuration: {reason}")]
    Configuration { node: String, reason: String },

    #[error("node `{0}` is not in a state that permits this operation")]
    InvalidState(String),

    #[error("pad format mismatch on node `{node}` pad {pad}: {reason}")]
    FormatMismatch { node: String, pad: usize, reason: String },

    #[error("buffer pool exhausted: {0}")]
    PoolExhausted(#[from] sp_core::error::CoreError),

    #[error("filter `{0}` stalled and produced no output this block")]
    FilterStall(String),

    #[error("unknown filter instance `{0}`")]
    UnknownFilter(String),

    #[error("parameter `{parameter}` on filter `{filter}` rejected: {reason}")]
    InvalidParameter { filter: String, parameter: String, reason: String },
}
