//! End-to-end scenarios, one per concrete case spec.md §8 names. Each
//! builds a real `Engine` from a `Configuration` and drives it through
//! `tick`/`update_parameter` the way a host would.

use std::collections::BTreeMap;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sp_engine::config::{
    BufferPolicyConfig, ChannelLayoutConfig, Configuration, ConnectionConfig, NodeConfig, NodeKind, SampleFormatConfig,
};
use sp_engine::Engine;
use sp_hw::driver::{BufferSizeLimits, DeviceDriver, DeviceSpec, Direction, DriverCallback};

/// A `DeviceDriver` that never touches real hardware: negotiates whatever
/// rate/frame count the engine asks for, and records how many times each
/// lifecycle step fired.
struct FakeDriver {
    calls: Arc<AtomicUsize>,
}

impl DeviceDriver for FakeDriver {
    fn load(&mut self, _device_name: &str) -> sp_hw::error::Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
    fn init(&mut self, preferred_rate: u32, preferred_frames: usize) -> sp_hw::error::Result<DeviceSpec> {
        Ok(DeviceSpec { sample_rate: preferred_rate, frames: preferred_frames, input_channels: 2, output_channels: 2 })
    }
    fn channel_count(&self, _direction: Direction) -> usize {
        2
    }
    fn buffer_size_limits(&self) -> BufferSizeLimits {
        (32, 8192, 32)
    }
    fn sample_rate_supported(&self, _rate: u32) -> bool {
        true
    }
    fn create_buffers(&mut self, _i: Vec<usize>, _o: Vec<usize>, _f: usize, _cb: DriverCallback) -> sp_hw::error::Result<()> {
        Ok(())
    }
    fn start(&mut self) -> sp_hw::error::Result<()> {
        Ok(())
    }
    fn stop(&mut self) -> sp_hw::error::Result<()> {
        Ok(())
    }
}

fn fake_driver() -> Box<dyn DeviceDriver> {
    Box::new(FakeDriver { calls: Arc::new(AtomicUsize::new(0)) })
}

fn hw_node(name: &str, kind: NodeKind) -> NodeConfig {
    NodeConfig {
        name: name.into(),
        kind,
        params: BTreeMap::from([("channels".into(), "0,1".into())]),
        input_pads: if matches!(kind, NodeKind::HardwareSink) { 1 } else { 0 },
        output_pads: if matches!(kind, NodeKind::HardwareSource) { 1 } else { 0 },
        description: None,
    }
}

fn wire(source: &str, sink: &str) -> ConnectionConfig {
    ConnectionConfig { source_name: source.into(), source_pad: 0, sink_name: sink.into(), sink_pad: 0, allow_format_conversion: false, buffer_policy: BufferPolicyConfig::Move }
}

fn sine_block(frames: usize, freq_hz: f32, sample_rate: u32) -> Vec<f32> {
    (0..frames).map(|i| (2.0 * PI * freq_hz * i as f32 / sample_rate as f32).sin()).collect()
}

fn rms(samples: &[f32]) -> f32 {
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Scenario: hardware_source -> hardware_sink. One tick of index samples
/// in is forwarded to both channels unchanged.
#[test]
fn straight_wire_forwards_indexed_samples() {
    let config = Configuration {
        device_name: "fake".into(),
        sample_rate: 48_000,
        buffer_size: 256,
        internal_format: SampleFormatConfig::F32,
        internal_layout: ChannelLayoutConfig::Stereo,
        auto_configure: true,
        nodes: vec![hw_node("in", NodeKind::HardwareSource), hw_node("out", NodeKind::HardwareSink)],
        connections: vec![wire("in", "out")],
        initial_control_commands: vec![],
    };

    let mut engine = Engine::build(&config, Some(fake_driver())).unwrap();
    engine.start(None, &[]).unwrap();

    let frames = engine.shape().frames;
    let left: Vec<f32> = (0..frames).map(|i| i as f32).collect();
    let right = left.clone();
    let input: Vec<&[f32]> = vec![&left, &right];

    let mut out_left = vec![0.0f32; frames];
    let mut out_right = vec![0.0f32; frames];
    let mut output: Vec<&mut [f32]> = vec![&mut out_left, &mut out_right];
    engine.tick(&input, &mut output).unwrap();
    drop(output);

    assert_eq!(out_left, left);
    assert_eq!(out_right, right);
}

/// Scenario: hardware_source -> filter_processor(equalizer f=1000 Q=1
/// gain=-10) -> hardware_sink, then a live `update_parameter` nudge.
#[test]
fn equalizer_in_the_middle_attenuates_1khz_and_responds_to_live_parameter_changes() {
    let sample_rate = 48_000;
    let frames = 4096;
    let config = Configuration {
        device_name: "fake".into(),
        sample_rate,
        buffer_size: frames,
        internal_format: SampleFormatConfig::F32,
        internal_layout: ChannelLayoutConfig::Stereo,
        auto_configure: true,
        nodes: vec![
            hw_node("in", NodeKind::HardwareSource),
            NodeConfig {
                name: "eq".into(),
                kind: NodeKind::FilterProcessor,
                params: BTreeMap::new(),
                input_pads: 1,
                output_pads: 1,
                description: Some("equalizer f=1000 Q=1 gain=-10".into()),
            },
            hw_node("out", NodeKind::HardwareSink),
        ],
        connections: vec![wire("in", "eq"), wire("eq", "out")],
        initial_control_commands: vec![],
    };

    let mut engine = Engine::build(&config, Some(fake_driver())).unwrap();
    engine.start(None, &[]).unwrap();

    let tone = sine_block(frames, 1_000.0, sample_rate);
    let in_rms = rms(&tone);

    let run_tick = |engine: &mut Engine, tone: &[f32]| -> Vec<f32> {
        let input: Vec<&[f32]> = vec![tone, tone];
        let mut out_left = vec![0.0f32; tone.len()];
        let mut out_right = vec![0.0f32; tone.len()];
        {
            let mut output: Vec<&mut [f32]> = vec![&mut out_left, &mut out_right];
            engine.tick(&input, &mut output).unwrap();
        }
        out_left
    };

    // warm up the IIR state, then measure steady state attenuation.
    for _ in 0..3 {
        run_tick(&mut engine, &tone);
    }
    let attenuated = run_tick(&mut engine, &tone);
    let out_rms = rms(&attenuated);
    let attenuation_db = 20.0 * (out_rms / in_rms).log10();
    assert!(attenuation_db <= -8.0, "expected at least 8 dB attenuation at 1 kHz, got {attenuation_db} dB");

    // well outside +/- 2 octaves (250 Hz .. 4 kHz): near-unity gain.
    let far_tone = sine_block(frames, 8_000.0, sample_rate);
    for _ in 0..3 {
        run_tick(&mut engine, &far_tone);
    }
    let far_out = run_tick(&mut engine, &far_tone);
    let far_db = 20.0 * (rms(&far_out) / rms(&far_tone)).log10();
    assert!(far_db.abs() <= 1.0, "expected near-unity gain at 8 kHz, got {far_db} dB");

    // live parameter nudge: gain -10 -> -20, ~10 dB more attenuation.
    engine.update_parameter("eq", "equalizer", "gain", -20.0).unwrap();
    for _ in 0..3 {
        run_tick(&mut engine, &tone);
    }
    let nudged = run_tick(&mut engine, &tone);
    let nudged_db = 20.0 * (rms(&nudged) / in_rms).log10();
    assert!(nudged_db < attenuation_db - 5.0, "expected a further ~10 dB drop after the nudge, went from {attenuation_db} to {nudged_db}");

    // touching only `freq` (same value, no real change) must not silently
    // reset the just-nudged `gain` back toward 0 dB.
    engine.update_parameter("eq", "equalizer", "freq", 1_000.0).unwrap();
    for _ in 0..3 {
        run_tick(&mut engine, &tone);
    }
    let after_freq_touch = run_tick(&mut engine, &tone);
    let after_freq_touch_db = 20.0 * (rms(&after_freq_touch) / in_rms).log10();
    assert!(
        after_freq_touch_db < attenuation_db - 5.0,
        "an unrelated freq update should not undo the gain nudge, went from {nudged_db} to {after_freq_touch_db}"
    );
}

/// Scenario: file_source(wav) -> hardware_sink. At most one silent block
/// at start-up, samples arrive in order after that.
#[test]
fn file_source_feeds_hardware_sink_with_at_most_one_silent_block() {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let path = temp.path().to_str().unwrap().to_string();

    let sample_rate = 48_000;
    let frames = 64;
    let total_frames = frames * 6;
    let samples: Vec<f32> = (0..total_frames).map(|i| (i as f32 / total_frames as f32) - 0.5).collect();
    {
        let mut writer = hound::WavWriter::create(
            &path,
            hound::WavSpec { channels: 2, sample_rate, bits_per_sample: 32, sample_format: hound::SampleFormat::Float },
        )
        .unwrap();
        for &s in &samples {
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    let config = Configuration {
        device_name: "fake".into(),
        sample_rate,
        buffer_size: frames,
        internal_format: SampleFormatConfig::F32,
        internal_layout: ChannelLayoutConfig::Stereo,
        auto_configure: true,
        nodes: vec![
            NodeConfig {
                name: "reader".into(),
                kind: NodeKind::FileSource,
                params: BTreeMap::from([("path".into(), path.clone())]),
                input_pads: 0,
                output_pads: 1,
                description: None,
            },
            hw_node("out", NodeKind::HardwareSink),
        ],
        connections: vec![wire("reader", "out")],
        initial_control_commands: vec![],
    };

    let mut engine = Engine::build(&config, Some(fake_driver())).unwrap();
    engine.start(None, &[]).unwrap();

    let zero_in = vec![0.0f32; frames];
    let input: Vec<&[f32]> = vec![&zero_in, &zero_in];

    let mut received: Vec<f32> = Vec::new();
    let mut silent_blocks = 0;
    let mut mid_stream_silence = false;
    for tick_idx in 0..6 {
        let mut out_left = vec![0.0f32; frames];
        let mut out_right = vec![0.0f32; frames];
        // give the decode worker a moment to stay ahead of the ring.
        let mut attempts = 0;
        loop {
            {
                let mut output: Vec<&mut [f32]> = vec![&mut out_left, &mut out_right];
                engine.tick(&input, &mut output).unwrap();
            }
            if out_left.iter().any(|&s| s != 0.0) || attempts > 50 {
                break;
            }
            attempts += 1;
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let is_silent = out_left.iter().all(|&s| s == 0.0);
        if is_silent {
            silent_blocks += 1;
            if tick_idx > 0 {
                mid_stream_silence = true;
            }
        } else {
            received.extend_from_slice(&out_left);
        }
    }

    assert!(silent_blocks <= 1, "expected at most one priming block, saw {silent_blocks}");
    assert!(!mid_stream_silence, "saw a silent block mid-stream");
    for (a, b) in received.iter().zip(samples.iter()) {
        assert!((a - b).abs() < 1e-4, "sample mismatch: {a} vs {b}");
    }
}

/// Scenario: hardware_source -> file_sink(wav). A file-sink worker that
/// never drains (encode_block blocks forever) causes every push past the
/// bounded queue's depth to overrun, deterministically.
#[test]
fn stalled_file_sink_worker_reports_overrun() {
    use sp_core::pool::{AudioBuffer, BufferFormat, BufferPool, BufferShape, ChannelLayout};
    use sp_graph::node::{FileEncoder, FileSinkNode};

    struct BlockingEncoder {
        gate: Arc<std::sync::atomic::AtomicBool>,
    }
    impl FileEncoder for BlockingEncoder {
        fn encode_block(&mut self, _buffer: &AudioBuffer) -> Result<(), String> {
            while !self.gate.load(Ordering::Relaxed) {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            Ok(())
        }
        fn finish(&mut self) -> Result<(), String> {
            Ok(())
        }
    }

    let gate = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut node = FileSinkNode::new("out");
    node.configure(Box::new(BlockingEncoder { gate: gate.clone() })).unwrap();
    node.start().unwrap();

    let shape = BufferShape { format: BufferFormat::F32, layout: ChannelLayout::Stereo, frames: 16, sample_rate: 48_000 };
    let pool = BufferPool::new().with_bucket(shape, true, 16);

    // the worker blocks on the very first block it pops; every push after
    // the queue (capacity rounds up from FILE_QUEUE_DEPTH=4) fills must
    // overrun.
    for _ in 0..12 {
        let buffer = pool.acquire(shape, true).unwrap();
        node.accept(buffer);
    }

    assert!(node.overrun_count() > 0, "expected a stalled worker to produce at least one overrun");

    gate.store(true, Ordering::Relaxed);
    node.stop().unwrap();
}

/// Scenario: a cyclic configuration is rejected, naming both nodes.
#[test]
fn cyclic_configuration_is_rejected() {
    let config = Configuration {
        device_name: "fake".into(),
        sample_rate: 48_000,
        buffer_size: 256,
        internal_format: SampleFormatConfig::F32,
        internal_layout: ChannelLayoutConfig::Stereo,
        auto_configure: true,
        nodes: vec![
            NodeConfig { name: "a".into(), kind: NodeKind::FilterProcessor, params: BTreeMap::new(), input_pads: 1, output_pads: 1, description: Some("identity".into()) },
            NodeConfig { name: "b".into(), kind: NodeKind::FilterProcessor, params: BTreeMap::new(), input_pads: 1, output_pads: 1, description: Some("identity".into()) },
        ],
        connections: vec![wire("a", "b"), wire("b", "a")],
        initial_control_commands: vec![],
    };

    let err = Engine::build(&config, None).err().unwrap();
    assert!(matches!(err, sp_engine::EngineError::Graph(sp_graph::GraphError::Cycle(_, _))));
}
