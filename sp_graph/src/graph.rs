//! The node graph: ordered node list, connection set, and precomputed
//! topological processing order.
//!
//! Grounded on the teacher's `Graph<S>`/`GraphBuilder<S>` (`graph.rs`):
//! keeps the arena-by-index storage and Kahn's-algorithm topological sort,
//! generalized from a fixed audio-buffer-per-output-port model to the
//! pad/connection contract spec.md describes, and replacing the teacher's
//! auto-mixer-insertion convenience with explicit cycle rejection (spec.md
//! scenario 6 requires a named-nodes error, not silent topology repair).

use std::collections::HashMap;

use sp_core::pool::BufferPool;

use crate::context::DspContext;
use crate::error::{GraphError, Result};
use crate::node::{Node, NodeId};

/// Buffer-sharing policy across a connection's fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// The buffer is moved to the single sink; only one connection may use
    /// `Move` per source pad.
    Move,
    /// The buffer's ref count is bumped per fan-out edge.
    SharedRef,
}

/// Immutable edge: (source node, output pad) -> (sink node, input pad).
#[derive(Debug, Clone)]
pub struct Connection {
    pub from: NodeId,
    pub from_pad: usize,
    pub to: NodeId,
    pub to_pad: usize,
    pub buffer_policy: BufferPolicy,
}

/// An ordered node list, its connections, and the precomputed processing
/// order over processor nodes (sources start the tick, sinks end it).
pub struct Graph {
    nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
    connections: Vec<Connection>,
    processor_order: Vec<NodeId>,
    context: DspContext,
    /// Per-tick cache of `SharedRef` source-pad outputs, so a pad that fans
    /// out to several sinks runs its producing node's `produce` once and
    /// clone-refs the result to each fan-out edge. Cleared at the start of
    /// every `tick_processors` call.
    tick_cache: HashMap<(usize, usize), sp_core::pool::AudioBuffer>,
}

impl Graph {
    pub fn new(context: DspContext) -> Self {
        Self {
            nodes: Vec::new(),
            names: HashMap::new(),
            connections: Vec::new(),
            processor_order: Vec::new(),
            context,
            tick_cache: HashMap::new(),
        }
    }

    pub fn context(&self) -> &DspContext {
        &self.context
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn node_id_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn processor_order(&self) -> &[NodeId] {
        &self.processor_order
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Add a node to the graph. The node's name must be unique.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        let name = node.name().to_string();
        if self.names.contains_key(&name) {
            return Err(GraphError::DuplicateNodeName(name));
        }
        let id = NodeId(self.nodes.len());
        self.names.insert(name, id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Connect one pad to another, validating pad indices and the
    /// one-incoming-connection-per-sink-pad invariant.
    pub fn connect(&mut self, from: NodeId, from_pad: usize, to: NodeId, to_pad: usize, buffer_policy: BufferPolicy) -> Result<()> {
        if from == to {
            return Err(GraphError::SelfLoop(self.node(from).map(Node::name).unwrap_or_default().to_string()));
        }

        let source = self.node(from).ok_or_else(|| GraphError::UnknownNode(format!("#{}", from.0)))?;
        if from_pad >= source.output_pad_count() {
            return Err(GraphError::UnknownPad { node: source.name().to_string(), pad: from_pad, count: source.output_pad_count() });
        }

        let sink = self.node(to).ok_or_else(|| GraphError::UnknownNode(format!("#{}", to.0)))?;
        if to_pad >= sink.input_pad_count() {
            return Err(GraphError::UnknownPad { node: sink.name().to_string(), pad: to_pad, count: sink.input_pad_count() });
        }

        let already_connected = self.connections.iter().any(|c| c.to == to && c.to_pad == to_pad);
        if already_connected {
            return Err(GraphError::PadAlreadyConnected { node: sink.name().to_string(), pad: to_pad });
        }

        // A source pad may fan out to several sinks only under `SharedRef`;
        // a `Move` edge must be the pad's sole outgoing connection.
        let existing_policy = self.connections.iter().find(|c| c.from == from && c.from_pad == from_pad).map(|c| c.buffer_policy);
        if let Some(existing) = existing_policy
            && (existing == BufferPolicy::Move || buffer_policy == BufferPolicy::Move)
        {
            return Err(GraphError::DuplicateMoveConnection { node: source.name().to_string(), pad: from_pad });
        }

        self.connections.push(Connection { from, from_pad, to, to_pad, buffer_policy });
        Ok(())
    }

    /// Compute the topological order over processor nodes only (neither a
    /// pure source nor a pure sink), verifying acyclicity across the whole
    /// graph. Must be called after all nodes/connections are in place and
    /// before the graph starts running.
    pub fn prepare(&mut self) -> Result<()> {
        let order = self.topological_order()?;
        self.processor_order = order.into_iter().filter(|id| !self.nodes[id.0].is_source() && !self.nodes[id.0].is_sink()).collect();
        Ok(())
    }

    fn topological_order(&self) -> Result<Vec<NodeId>> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];

        for conn in &self.connections {
            adjacency[conn.from.0].push(conn.to.0);
            in_degree[conn.to.0] += 1;
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(i) = queue.pop() {
            order.push(NodeId(i));
            for &next in &adjacency[i] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push(next);
                }
            }
        }

        if order.len() != n {
            let stuck: Vec<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
            let a = stuck.first().map(|&i| self.nodes[i].name()).unwrap_or("?");
            let b = stuck.get(1).map(|&i| self.nodes[i].name()).unwrap_or(a);
            return Err(GraphError::Cycle(a.to_string(), b.to_string()));
        }

        Ok(order)
    }

    /// Run one realtime tick: walk the processor order, resolving each
    /// processor's input connections, calling `process`, and routing its
    /// output to downstream connections. Sources and sinks are driven
    /// separately by the engine (see spec.md §4.6 steps 1/2/4/5).
    pub fn tick_processors(&mut self, pool: &BufferPool) -> Result<()> {
        self.tick_cache.clear();
        for &id in &self.processor_order.clone() {
            self.route_inputs(id)?;
            self.nodes[id.0].process(pool)?;
            self.route_output(id)?;
        }
        Ok(())
    }

    /// Produce the buffer for a connection's source pad, per `buffer_policy`:
    /// `Move` calls the producing node's `produce` directly (the pad has at
    /// most one such connection, enforced by `connect`); `SharedRef` runs
    /// `produce` once per tick per pad and clone-refs the cached result to
    /// every fan-out edge.
    fn produce_for(&mut self, from: NodeId, pad: usize, policy: BufferPolicy) -> Option<sp_core::pool::AudioBuffer> {
        match policy {
            BufferPolicy::Move => self.nodes[from.0].produce(pad),
            BufferPolicy::SharedRef => {
                if let Some(buffer) = self.tick_cache.get(&(from.0, pad)) {
                    return Some(buffer.clone_ref());
                }
                let buffer = self.nodes[from.0].produce(pad)?;
                let shared = buffer.clone_ref();
                self.tick_cache.insert((from.0, pad), buffer);
                Some(shared)
            }
        }
    }

    fn route_inputs(&mut self, to: NodeId) -> Result<()> {
        let incoming: Vec<Connection> = self.connections.iter().filter(|c| c.to == to).cloned().collect();
        for conn in incoming {
            let Some(buffer) = self.produce_for(conn.from, conn.from_pad, conn.buffer_policy) else { continue };
            self.nodes[to.0].accept(conn.to_pad, buffer)?;
        }
        Ok(())
    }

    fn route_output(&mut self, from: NodeId) -> Result<()> {
        let outgoing: Vec<Connection> = self.connections.iter().filter(|c| c.from == from).cloned().collect();
        for conn in outgoing {
            if let Some(buffer) = self.produce_for(conn.from, conn.from_pad, conn.buffer_policy) {
                self.nodes[conn.to.0].accept(conn.to_pad, buffer)?;
            }
        }
        Ok(())
    }

    /// Resolve the buffer a sink's input pad should consume this tick by
    /// following its single incoming connection back to the producing
    /// node's `produce`, honoring the connection's `buffer_policy`.
    pub fn resolve_sink_input(&mut self, sink: NodeId, pad: usize) -> Option<sp_core::pool::AudioBuffer> {
        let conn = self.connections.iter().find(|c| c.to == sink && c.to_pad == pad)?.clone();
        self.produce_for(conn.from, conn.from_pad, conn.buffer_policy)
    }

    pub fn start_all(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.start()?;
        }
        Ok(())
    }

    pub fn stop_all(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.stop()?;
        }
        Ok(())
    }
}

/// Fluent builder mirroring the teacher's `GraphBuilder`, generalized to
/// the node/pad/connection model above.
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(context: DspContext) -> Self {
        Self { graph: Graph::new(context) }
    }

    pub fn add(&mut self, node: Node) -> Result<NodeId> {
        self.graph.add_node(node)
    }

    pub fn connect(&mut self, from: NodeId, from_pad: usize, to: NodeId, to_pad: usize, policy: BufferPolicy) -> Result<&mut Self> {
        self.graph.connect(from, from_pad, to, to_pad, policy)?;
        Ok(self)
    }

    pub fn build(mut self) -> Result<Graph> {
        self.graph.prepare()?;
        Ok(self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FilterProcessorNode, HardwareSinkNode, HardwareSourceNode};
    use sp_core::pool::{BufferFormat, ChannelLayout};

    fn context() -> DspContext {
        DspContext::new(48_000, 256, BufferFormat::F32, ChannelLayout::Stereo)
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut graph = Graph::new(context());
        graph.add_node(Node::HardwareSource(HardwareSourceNode::new("in"))).unwrap();
        let err = graph.add_node(Node::HardwareSource(HardwareSourceNode::new("in"))).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNodeName("in".into()));
    }

    #[test]
    fn rejects_self_loop() {
        let mut graph = Graph::new(context());
        let a = graph.add_node(Node::HardwareSource(HardwareSourceNode::new("a"))).unwrap();
        let err = graph.connect(a, 0, a, 0, BufferPolicy::Move).unwrap_err();
        assert!(matches!(err, GraphError::SelfLoop(_)));
    }

    #[test]
    fn detects_cycle_between_two_processors() {
        let mut graph = Graph::new(context());
        let mut a = FilterProcessorNode::new("a");
        a.configure("identity", 48_000, 2).unwrap();
        let mut b = FilterProcessorNode::new("b");
        b.configure("identity", 48_000, 2).unwrap();
        let a_id = graph.add_node(Node::FilterProcessor(a)).unwrap();
        let b_id = graph.add_node(Node::FilterProcessor(b)).unwrap();
        graph.connect(a_id, 0, b_id, 0, BufferPolicy::Move).unwrap();
        graph.connect(b_id, 0, a_id, 0, BufferPolicy::Move).unwrap();

        let err = graph.prepare().unwrap_err();
        match err {
            GraphError::Cycle(x, y) => {
                assert!((x == "a" && y == "b") || (x == "b" && y == "a"));
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn straight_wire_topological_order() {
        let mut graph = Graph::new(context());
        let src = graph.add_node(Node::HardwareSource(HardwareSourceNode::new("src"))).unwrap();
        let sink = graph.add_node(Node::HardwareSink(HardwareSinkNode::new("sink"))).unwrap();
        graph.connect(src, 0, sink, 0, BufferPolicy::Move).unwrap();
        graph.prepare().unwrap();
        assert!(graph.processor_order().is_empty());
    }

    #[test]
    fn rejects_second_move_connection_from_the_same_source_pad() {
        let mut graph = Graph::new(context());
        let src = graph.add_node(Node::HardwareSource(HardwareSourceNode::new("src"))).unwrap();
        let a = graph.add_node(Node::HardwareSink(HardwareSinkNode::new("a"))).unwrap();
        let b = graph.add_node(Node::HardwareSink(HardwareSinkNode::new("b"))).unwrap();
        graph.connect(src, 0, a, 0, BufferPolicy::Move).unwrap();
        let err = graph.connect(src, 0, b, 0, BufferPolicy::Move).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateMoveConnection { .. }));
    }

    #[test]
    fn shared_ref_fan_out_delivers_the_same_tick_block_to_every_sink() {
        let mut graph = Graph::new(context());
        let mut src = HardwareSourceNode::new("src");
        src.configure(vec![0, 1]).unwrap();
        let src_id = graph.add_node(Node::HardwareSource(src)).unwrap();
        let mut a = FilterProcessorNode::new("a");
        a.configure("identity", 48_000, 2).unwrap();
        let mut b = FilterProcessorNode::new("b");
        b.configure("identity", 48_000, 2).unwrap();
        let a_id = graph.add_node(Node::FilterProcessor(a)).unwrap();
        let b_id = graph.add_node(Node::FilterProcessor(b)).unwrap();
        graph.connect(src_id, 0, a_id, 0, BufferPolicy::SharedRef).unwrap();
        graph.connect(src_id, 0, b_id, 0, BufferPolicy::SharedRef).unwrap();
        graph.prepare().unwrap();

        let pool = sp_core::pool::BufferPool::new().with_bucket(
            sp_core::pool::BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Stereo, frames: 256, sample_rate: 48_000 },
            true,
            4,
        );
        let shape = sp_core::pool::BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Stereo, frames: 256, sample_rate: 48_000 };
        let device_channels: [&[f32]; 2] = [&[1.0f32; 256], &[1.0f32; 256]];
        if let Some(Node::HardwareSource(n)) = graph.node_mut(src_id) {
            n.receive_hardware(&pool, shape, &device_channels).unwrap();
        }

        graph.tick_processors(&pool).unwrap();

        let out_a = if let Some(Node::FilterProcessor(n)) = graph.node_mut(a_id) { n.produce() } else { None };
        let out_b = if let Some(Node::FilterProcessor(n)) = graph.node_mut(b_id) { n.produce() } else { None };
        assert!(out_a.is_some(), "first fan-out sink should receive a block");
        assert!(out_b.is_some(), "second fan-out sink should also receive a block, not None");
    }

    #[test]
    fn duplicate_sink_pad_connection_rejected() {
        let mut graph = Graph::new(context());
        let a = graph.add_node(Node::HardwareSource(HardwareSourceNode::new("a"))).unwrap();
        let b = graph.add_node(Node::HardwareSource(HardwareSourceNode::new("b"))).unwrap();
        let sink = graph.add_node(Node::HardwareSink(HardwareSinkNode::new("sink"))).unwrap();
        graph.connect(a, 0, sink, 0, BufferPolicy::Move).unwrap();
        let err = graph.connect(b, 0, sink, 0, BufferPolicy::Move).unwrap_err();
        assert!(matches!(err, GraphError::PadAlreadyConnected { .. }));
    }
}
