pub mod context;
pub mod error;
pub mod filter_host;
pub mod graph;
pub mod node;

pub use context::DspContext;
pub use error::{GraphError, Result};
pub use graph::{BufferPolicy, Connection, Graph, GraphBuilder};
pub use node::{
    FileDecoder, FileEncoder, FileSinkNode, FileSourceNode, FilterProcessorNode, HardwareSinkNode, HardwareSourceNode, Node, NodeId, NodeState,
};
