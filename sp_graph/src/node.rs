//! Node variants: the five `AudioNode` kinds the graph schedules.
//!
//! Grounded on the teacher's `BlockType<S>` tagged-enum + match-dispatch
//! pattern (`block.rs`), generalized from DSP "blocks" carrying
//! oscillator/filter/mixer payloads to graph "nodes" carrying the five
//! node-kind payloads spec.md names. `FileSource`/`FileSink` depend on
//! codec-specific decode/encode, which would otherwise require `sp_graph`
//! to depend on `sp_file` — instead the codec is injected as a
//! `Box<dyn FileDecoder>`/`Box<dyn FileEncoder>` the way `bbx_player`
//! treats its device backend as a pluggable collaborator.

use std::sync::Arc;
use std::thread::JoinHandle;

use sp_core::pool::{AudioBuffer, BufferPool, BufferShape};

use crate::error::{GraphError, Result};
use crate::filter_host::FilterHost;

/// A node's unique identifier: its index into the graph's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Node lifecycle state. Transitions are driven only by the control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

/// Decodes a file into canonical-format blocks on a worker thread.
/// Implemented by `sp_file` for each supported container/codec.
pub trait FileDecoder: Send {
    /// Decode the next block, or `Ok(None)` at end of file.
    fn decode_block(&mut self, pool: &BufferPool) -> std::result::Result<Option<AudioBuffer>, String>;
}

/// Encodes canonical-format blocks to a file on a worker thread.
/// Implemented by `sp_file` for each supported container/codec.
pub trait FileEncoder: Send {
    fn encode_block(&mut self, buffer: &AudioBuffer) -> std::result::Result<(), String>;
    /// Flush delayed packets and write the trailer.
    fn finish(&mut self) -> std::result::Result<(), String>;
}

/// `HardwareSource`: reads device input channels into a canonical buffer.
pub struct HardwareSourceNode {
    name: String,
    state: NodeState,
    channels: Vec<usize>,
    latched: Option<AudioBuffer>,
}

impl HardwareSourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: NodeState::Unconfigured, channels: Vec::new(), latched: None }
    }

    pub fn configure(&mut self, channels: Vec<usize>) -> Result<()> {
        self.channels = channels;
        self.state = NodeState::Configured;
        Ok(())
    }

    /// Convert device channel buffers into a pooled canonical buffer and
    /// latch it on the single output pad until the next tick.
    pub fn receive_hardware(&mut self, pool: &BufferPool, shape: BufferShape, device_channels: &[&[f32]]) -> Result<()> {
        let mut buffer = pool.acquire(shape, true).map_err(GraphError::from)?;
        let plane = buffer.plane(0).map_err(GraphError::from)?;
        let frame_count = shape.frames;
        for frame in 0..frame_count {
            for (ch_index, &device_channel) in self.channels.iter().enumerate() {
                let Some(&sample) = device_channels.get(device_channel).and_then(|c| c.get(frame)) else { continue };
                let offset = (frame * self.channels.len() + ch_index) * 4;
                if offset + 4 <= plane.len() {
                    plane[offset..offset + 4].copy_from_slice(&sample.to_le_bytes());
                }
            }
        }
        self.latched = Some(buffer);
        Ok(())
    }

    pub fn produce(&mut self) -> Option<AudioBuffer> {
        self.latched.as_ref().map(|b| b.clone_ref())
    }
}

/// `HardwareSink`: writes a latched canonical buffer out to device channels.
pub struct HardwareSinkNode {
    name: String,
    state: NodeState,
    channels: Vec<usize>,
    input: Option<AudioBuffer>,
    underrun_count: u64,
}

impl HardwareSinkNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: NodeState::Unconfigured, channels: Vec::new(), input: None, underrun_count: 0 }
    }

    pub fn configure(&mut self, channels: Vec<usize>) -> Result<()> {
        self.channels = channels;
        self.state = NodeState::Configured;
        Ok(())
    }

    pub fn accept(&mut self, buffer: AudioBuffer) {
        self.input = Some(buffer);
    }

    /// Writes the latched input into the device buffers, or silence plus an
    /// underrun count if nothing was latched this tick.
    pub fn provide_hardware(&mut self, device_channels: &mut [&mut [f32]]) -> bool {
        let Some(buffer) = self.input.take() else {
            for &device_channel in &self.channels {
                if let Some(channel) = device_channels.get_mut(device_channel) {
                    channel.fill(0.0);
                }
            }
            self.underrun_count += 1;
            return false;
        };

        let Ok(plane) = buffer.plane_ref(0) else { return false };
        let frame_count = buffer.shape().frames;
        for frame in 0..frame_count {
            for (ch_index, &device_channel) in self.channels.iter().enumerate() {
                let offset = (frame * self.channels.len() + ch_index) * 4;
                if offset + 4 > plane.len() {
                    continue;
                }
                let sample = f32::from_le_bytes(plane[offset..offset + 4].try_into().unwrap());
                if let Some(out) = device_channels.get_mut(device_channel).and_then(|c| c.get_mut(frame)) {
                    *out = sample;
                }
            }
        }
        true
    }

    pub fn underrun_count(&self) -> u64 {
        self.underrun_count
    }
}

const FILE_QUEUE_DEPTH: usize = 4;

/// Bound on how long a file worker's cooperative shutdown is given before
/// it's treated as leaked (spec.md "bounded join window (default 1 s)").
const WORKER_JOIN_DEADLINE: std::time::Duration = std::time::Duration::from_secs(1);

/// Polls `handle` for up to `deadline` instead of blocking forever — `std`
/// has no join-with-timeout, so this spins on `JoinHandle::is_finished`,
/// the same poll-the-stop-flag idiom the workers themselves use. Returns
/// `true` if the worker exited and was joined; `false` if the deadline
/// elapsed first, in which case the handle is dropped without joining and
/// the worker thread is left to finish on its own.
fn join_with_deadline(handle: JoinHandle<()>, deadline: std::time::Duration) -> bool {
    let start = std::time::Instant::now();
    loop {
        if handle.is_finished() {
            let _ = handle.join();
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

/// `FileSource`: decodes a file on a worker thread into a bounded queue.
pub struct FileSourceNode {
    name: String,
    state: NodeState,
    consumer: Option<sp_core::spsc::Consumer<AudioBuffer>>,
    worker: Option<JoinHandle<()>>,
    stop_flag: Option<Arc<std::sync::atomic::AtomicBool>>,
    decoder: Option<Box<dyn FileDecoder>>,
    pool: Option<BufferPool>,
    eof_reached: bool,
    leaked: bool,
}

impl FileSourceNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: NodeState::Unconfigured,
            consumer: None,
            worker: None,
            stop_flag: None,
            decoder: None,
            pool: None,
            eof_reached: false,
            leaked: false,
        }
    }

    pub fn configure(&mut self, decoder: Box<dyn FileDecoder>, pool: BufferPool) -> Result<()> {
        self.decoder = Some(decoder);
        self.pool = Some(pool);
        self.state = NodeState::Configured;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        let mut decoder = self.decoder.take().ok_or_else(|| GraphError::InvalidState(self.name.clone()))?;
        let pool = self.pool.clone().ok_or_else(|| GraphError::InvalidState(self.name.clone()))?;
        let (mut producer, consumer) = sp_core::spsc::SpscRingBuffer::new(FILE_QUEUE_DEPTH);
        let stop_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop_flag);

        let handle = std::thread::Builder::new()
            .name(format!("sp_file_source:{}", self.name))
            .spawn(move || {
                while !worker_stop.load(std::sync::atomic::Ordering::Relaxed) {
                    match decoder.decode_block(&pool) {
                        Ok(Some(buffer)) => {
                            while producer.try_push(buffer.clone_ref()).is_err() {
                                if worker_stop.load(std::sync::atomic::Ordering::Relaxed) {
                                    return;
                                }
                                std::thread::sleep(std::time::Duration::from_millis(1));
                            }
                        }
                        Ok(None) => return,
                        Err(_) => return,
                    }
                }
            })
            .expect("failed to spawn file source worker");

        self.consumer = Some(consumer);
        self.worker = Some(handle);
        self.stop_flag = Some(stop_flag);
        self.state = NodeState::Running;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if let Some(flag) = &self.stop_flag {
            flag.store(true, std::sync::atomic::Ordering::Relaxed);
        }
        if let Some(handle) = self.worker.take()
            && !join_with_deadline(handle, WORKER_JOIN_DEADLINE) {
                self.leaked = true;
            }
        self.consumer = None;
        self.state = NodeState::Stopped;
        Ok(())
    }

    /// Non-blocking dequeue. Returns `None` on an empty queue (engine
    /// substitutes silence) and continues returning `None` after EOF.
    pub fn produce(&mut self) -> Option<AudioBuffer> {
        if self.eof_reached {
            return None;
        }
        let buffer = self.consumer.as_mut()?.try_pop();
        if buffer.is_none() && self.worker.is_none() {
            self.eof_reached = true;
        }
        buffer
    }

    pub fn eof_reached(&self) -> bool {
        self.eof_reached
    }

    /// Whether `stop()`'s join deadline elapsed before the decode worker
    /// exited. The worker was detached, not killed, and keeps running.
    pub fn leaked(&self) -> bool {
        self.leaked
    }
}

/// `FileSink`: encodes canonical blocks on a worker thread.
pub struct FileSinkNode {
    name: String,
    state: NodeState,
    producer: Option<sp_core::spsc::Producer<AudioBuffer>>,
    worker: Option<JoinHandle<()>>,
    stop_flag: Option<Arc<std::sync::atomic::AtomicBool>>,
    encoder: Option<Box<dyn FileEncoder>>,
    overrun_count: u64,
    sample_counter: u64,
    leaked: bool,
}

impl FileSinkNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: NodeState::Unconfigured,
            producer: None,
            worker: None,
            stop_flag: None,
            encoder: None,
            overrun_count: 0,
            sample_counter: 0,
            leaked: false,
        }
    }

    pub fn configure(&mut self, encoder: Box<dyn FileEncoder>) -> Result<()> {
        self.encoder = Some(encoder);
        self.state = NodeState::Configured;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        let mut encoder = self.encoder.take().ok_or_else(|| GraphError::InvalidState(self.name.clone()))?;
        let (producer, mut consumer) = sp_core::spsc::SpscRingBuffer::new(FILE_QUEUE_DEPTH);
        let stop_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop_flag);

        let handle = std::thread::Builder::new()
            .name(format!("sp_file_sink:{}", self.name))
            .spawn(move || loop {
                match consumer.try_pop() {
                    Some(buffer) => {
                        if encoder.encode_block(&buffer).is_err() {
                            return;
                        }
                    }
                    None => {
                        if worker_stop.load(std::sync::atomic::Ordering::Relaxed) {
                            let _ = encoder.finish();
                            return;
                        }
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                }
            })
            .expect("failed to spawn file sink worker");

        self.producer = Some(producer);
        self.worker = Some(handle);
        self.stop_flag = Some(stop_flag);
        self.state = NodeState::Running;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if let Some(flag) = &self.stop_flag {
            flag.store(true, std::sync::atomic::Ordering::Relaxed);
        }
        if let Some(handle) = self.worker.take()
            && !join_with_deadline(handle, WORKER_JOIN_DEADLINE) {
                self.leaked = true;
            }
        self.producer = None;
        self.state = NodeState::Stopped;
        Ok(())
    }

    /// Enqueue a clone-ref of `buffer`. Never blocks: drops and counts an
    /// overrun when the bounded queue is full.
    pub fn accept(&mut self, buffer: AudioBuffer) {
        self.sample_counter += buffer.shape().frames as u64;
        if let Some(producer) = &mut self.producer
            && producer.try_push(buffer).is_err() {
                self.overrun_count += 1;
            }
    }

    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Whether `stop()`'s join deadline elapsed before the encode worker
    /// exited. The worker was detached, not killed, and keeps running.
    pub fn leaked(&self) -> bool {
        self.leaked
    }
}

/// `FilterProcessor`: delegates to a [`FilterHost`].
pub struct FilterProcessorNode {
    name: String,
    state: NodeState,
    host: Option<FilterHost>,
    pending_input: Option<AudioBuffer>,
    pending_output: Option<AudioBuffer>,
    stalled: bool,
}

impl FilterProcessorNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: NodeState::Unconfigured, host: None, pending_input: None, pending_output: None, stalled: false }
    }

    pub fn configure(&mut self, description: &str, sample_rate: u32, channels: usize) -> Result<()> {
        self.host = Some(FilterHost::configure(description, sample_rate, channels)?);
        self.state = NodeState::Configured;
        Ok(())
    }

    pub fn accept(&mut self, buffer: AudioBuffer) {
        self.pending_input = Some(buffer);
    }

    /// Pushes the pending input to the host and pulls the resulting block,
    /// or leaves `produce` returning `None` (`FilterStall`) if the filter
    /// had no input this tick.
    pub fn process(&mut self, pool: &BufferPool) -> Result<()> {
        let Some(host) = &mut self.host else {
            return Err(GraphError::InvalidState(self.name.clone()));
        };
        if let Some(input) = self.pending_input.take() {
            host.push(&input, pool)?;
            self.pending_output = host.pull();
            self.stalled = self.pending_output.is_none();
        } else {
            self.pending_output = None;
            self.stalled = true;
        }
        Ok(())
    }

    pub fn produce(&mut self) -> Option<AudioBuffer> {
        self.pending_output.take()
    }

    /// Whether the most recent `process()` call produced no output,
    /// whether because the host stalled internally or no input arrived.
    pub fn stalled(&self) -> bool {
        self.stalled
    }

    pub fn update_parameter(&self, name: &str, value: f64) -> Result<()> {
        self.host
            .as_ref()
            .ok_or_else(|| GraphError::InvalidState(self.name.clone()))?
            .update_parameter(name, value)
    }
}

/// The tagged union of all node kinds the graph schedules.
pub enum Node {
    HardwareSource(HardwareSourceNode),
    HardwareSink(HardwareSinkNode),
    FileSource(FileSourceNode),
    FileSink(FileSinkNode),
    FilterProcessor(FilterProcessorNode),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::HardwareSource(n) => &n.name,
            Node::HardwareSink(n) => &n.name,
            Node::FileSource(n) => &n.name,
            Node::FileSink(n) => &n.name,
            Node::FilterProcessor(n) => &n.name,
        }
    }

    pub fn state(&self) -> NodeState {
        match self {
            Node::HardwareSource(n) => n.state,
            Node::HardwareSink(n) => n.state,
            Node::FileSource(n) => n.state,
            Node::FileSink(n) => n.state,
            Node::FilterProcessor(n) => n.state,
        }
    }

    pub fn input_pad_count(&self) -> usize {
        match self {
            Node::HardwareSource(_) => 0,
            Node::HardwareSink(_) => 1,
            Node::FileSource(_) => 0,
            Node::FileSink(_) => 1,
            Node::FilterProcessor(_) => 1,
        }
    }

    pub fn output_pad_count(&self) -> usize {
        match self {
            Node::HardwareSource(_) => 1,
            Node::HardwareSink(_) => 0,
            Node::FileSource(_) => 1,
            Node::FileSink(_) => 0,
            Node::FilterProcessor(_) => 1,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Node::HardwareSource(_) | Node::FileSource(_))
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, Node::HardwareSink(_) | Node::FileSink(_))
    }

    pub fn start(&mut self) -> Result<()> {
        match self {
            Node::HardwareSource(n) => {
                n.state = NodeState::Running;
                Ok(())
            }
            Node::HardwareSink(n) => {
                n.state = NodeState::Running;
                Ok(())
            }
            Node::FileSource(n) => n.start(),
            Node::FileSink(n) => n.start(),
            Node::FilterProcessor(n) => {
                n.state = NodeState::Running;
                Ok(())
            }
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        match self {
            Node::HardwareSource(n) => {
                n.state = NodeState::Stopped;
                Ok(())
            }
            Node::HardwareSink(n) => {
                n.state = NodeState::Stopped;
                Ok(())
            }
            Node::FileSource(n) => n.stop(),
            Node::FileSink(n) => n.stop(),
            Node::FilterProcessor(n) => {
                n.state = NodeState::Stopped;
                Ok(())
            }
        }
    }

    pub fn accept(&mut self, _pad: usize, buffer: AudioBuffer) -> Result<()> {
        match self {
            Node::HardwareSink(n) => {
                n.accept(buffer);
                Ok(())
            }
            Node::FileSink(n) => {
                n.accept(buffer);
                Ok(())
            }
            Node::FilterProcessor(n) => {
                n.accept(buffer);
                Ok(())
            }
            _ => Err(GraphError::InvalidState(self.name().to_string())),
        }
    }

    pub fn produce(&mut self, _pad: usize) -> Option<AudioBuffer> {
        match self {
            Node::HardwareSource(n) => n.produce(),
            Node::FileSource(n) => n.produce(),
            Node::FilterProcessor(n) => n.produce(),
            _ => None,
        }
    }

    /// Drives `FilterProcessor`'s host; a no-op for every other variant.
    pub fn process(&mut self, pool: &BufferPool) -> Result<()> {
        if let Node::FilterProcessor(n) = self {
            n.process(pool)
        } else {
            Ok(())
        }
    }
}
