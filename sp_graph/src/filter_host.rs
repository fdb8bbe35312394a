//! Thin wrapper over `biquad`'s IIR filters for one `FilterProcessor` node.
//!
//! Grounded on the teacher's parameter-smoothing machinery
//! (`sp_graph::parameter`) for the idea of a lock-free, single-slot update
//! channel, generalized here to one cell per (filter instance, parameter
//! name) rather than a ramped value, per the single-slot atomic-cell
//! contract.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use biquad::{Biquad, Coefficients, DirectForm1, Hertz, Q_BUTTERWORTH_F32, Type};

use sp_core::pool::{AudioBuffer, BufferFormat};

use crate::error::{GraphError, Result};

/// A single-slot lock-free cell: the control thread stores a new value,
/// the realtime thread loads and clears the dirty flag at the start of the
/// next `push`.
#[derive(Default)]
struct ParamCell {
    bits: AtomicU64,
    dirty: AtomicBool,
}

impl ParamCell {
    fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
        self.dirty.store(true, Ordering::Release);
    }

    fn take(&self) -> Option<f64> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(f64::from_bits(self.bits.load(Ordering::Acquire)))
        } else {
            None
        }
    }
}

/// The parsed shape of a `graph_description` string such as
/// `"equalizer f=1000 Q=1 gain=-10"`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterKind {
    Identity,
    LowPass,
    HighPass,
    Notch,
    PeakingEq,
}

fn parse_description(description: &str) -> Result<(FilterKind, f32, f32, f32)> {
    let mut tokens = description.split_whitespace();
    let kind = match tokens.next() {
        Some("identity") => FilterKind::Identity,
        Some("lowpass") => FilterKind::LowPass,
        Some("highpass") => FilterKind::HighPass,
        Some("notch") => FilterKind::Notch,
        Some("equalizer") | Some("peaking_eq") => FilterKind::PeakingEq,
        Some(other) => {
            return Err(GraphError::Configuration {
                node: "filter_host".into(),
                reason: format!("unknown filter kind `{other}`"),
            });
        }
        None => {
            return Err(GraphError::Configuration {
                node: "filter_host".into(),
                reason: "empty filter description".into(),
            });
        }
    };

    let mut freq = 1_000.0f32;
    let mut q = Q_BUTTERWORTH_F32;
    let mut gain_db = 0.0f32;

    for token in tokens {
        let Some((key, value)) = token.split_once('=') else { continue };
        let parsed: f32 = value.parse().map_err(|_| GraphError::Configuration {
            node: "filter_host".into(),
            reason: format!("invalid value for `{key}`"),
        })?;
        match key {
            "f" | "freq" | "frequency" => freq = parsed,
            "Q" | "q" => q = parsed,
            "gain" => gain_db = parsed,
            _ => {}
        }
    }

    Ok((kind, freq, q, gain_db))
}

/// One mono biquad per channel, driven in lock-step.
pub struct FilterHost {
    kind: FilterKind,
    filters: Vec<DirectForm1<f32>>,
    channels: usize,
    sample_rate: f32,
    freq_cell: ParamCell,
    q_cell: ParamCell,
    gain_cell: ParamCell,
    /// Last-applied value of each parameter, so a single-parameter update
    /// leaves the others untouched instead of reverting them to a default.
    freq: f32,
    q: f32,
    gain_db: f32,
    pending_output: Option<AudioBuffer>,
}

impl FilterHost {
    /// Parse `graph_description`, allocate filter state for `channels`
    /// channels at `sample_rate`. All allocation happens here, never in
    /// `push`/`pull`.
    pub fn configure(description: &str, sample_rate: u32, channels: usize) -> Result<Self> {
        let (kind, freq, q, gain_db) = parse_description(description)?;
        let coeffs = Self::build_coefficients(kind, sample_rate as f32, freq, q, gain_db)?;
        let filters = (0..channels).map(|_| DirectForm1::<f32>::new(coeffs)).collect();

        Ok(Self {
            kind,
            filters,
            channels,
            sample_rate: sample_rate as f32,
            freq_cell: ParamCell::default(),
            q_cell: ParamCell::default(),
            gain_cell: ParamCell::default(),
            freq,
            q,
            gain_db,
            pending_output: None,
        })
    }

    fn build_coefficients(kind: FilterKind, sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> Result<Coefficients<f32>> {
        if matches!(kind, FilterKind::Identity) {
            return Ok(Coefficients { a1: 0.0, a2: 0.0, b0: 1.0, b1: 0.0, b2: 0.0 });
        }

        let fs = Hertz::<f32>::from_hz(sample_rate).map_err(|_| GraphError::Configuration {
            node: "filter_host".into(),
            reason: "invalid sample rate".into(),
        })?;
        let f0 = Hertz::<f32>::from_hz(freq).map_err(|_| GraphError::Configuration {
            node: "filter_host".into(),
            reason: "cutoff frequency exceeds Nyquist".into(),
        })?;

        let filter_type = match kind {
            FilterKind::LowPass => Type::LowPass,
            FilterKind::HighPass => Type::HighPass,
            FilterKind::Notch => Type::Notch,
            FilterKind::PeakingEq => Type::PeakingEQ(gain_db),
            FilterKind::Identity => unreachable!(),
        };

        Coefficients::<f32>::from_params(filter_type, fs, f0, q).map_err(|e| GraphError::Configuration {
            node: "filter_host".into(),
            reason: format!("{e:?}"),
        })
    }

    /// Queue a live parameter update. Takes effect at the start of the next
    /// `push`.
    pub fn update_parameter(&self, name: &str, value: f64) -> Result<()> {
        match name {
            "freq" | "f" | "frequency" => self.freq_cell.store(value),
            "Q" | "q" => self.q_cell.store(value),
            "gain" => self.gain_cell.store(value),
            other => {
                return Err(GraphError::InvalidParameter {
                    filter: "filter_host".into(),
                    parameter: other.into(),
                    reason: "unknown parameter".into(),
                });
            }
        }
        Ok(())
    }

    fn drain_parameter_updates(&mut self) -> Result<()> {
        let freq = self.freq_cell.take();
        let q = self.q_cell.take();
        let gain = self.gain_cell.take();
        if freq.is_none() && q.is_none() && gain.is_none() {
            return Ok(());
        }

        // Re-derive coefficients from whichever fields changed; a parameter
        // that wasn't touched this update keeps its last-applied value.
        self.freq = freq.map(|v| v as f32).unwrap_or(self.freq);
        self.q = q.map(|v| v as f32).unwrap_or(self.q);
        self.gain_db = gain.map(|v| v as f32).unwrap_or(self.gain_db);

        let coeffs = Self::build_coefficients(self.kind, self.sample_rate, self.freq, self.q, self.gain_db)?;
        for filter in &mut self.filters {
            filter.update_coefficients(coeffs);
        }
        Ok(())
    }

    /// Hand a block of input to the filter. Must not block or allocate
    /// beyond the one output buffer acquired from `pool`.
    pub fn push(&mut self, input: &AudioBuffer, pool: &sp_core::pool::BufferPool) -> Result<()> {
        self.drain_parameter_updates()?;

        if input.shape().format != BufferFormat::F32 {
            return Err(GraphError::FormatMismatch {
                node: "filter_host".into(),
                pad: 0,
                reason: "filter host only operates on canonical f32 buffers".into(),
            });
        }

        let mut output = pool.acquire(input.shape(), true).map_err(GraphError::from)?;
        {
            let src = input.plane_ref(0).map_err(GraphError::from)?;
            let dst = output.plane(0).map_err(GraphError::from)?;
            let frame_count = input.shape().frames;
            for frame in 0..frame_count {
                for ch in 0..self.channels {
                    let offset = (frame * self.channels + ch) * 4;
                    if offset + 4 > src.len() {
                        continue;
                    }
                    let sample = f32::from_le_bytes(src[offset..offset + 4].try_into().unwrap());
                    let processed = self.filters[ch].run(sample);
                    dst[offset..offset + 4].copy_from_slice(&processed.to_le_bytes());
                }
            }
        }
        self.pending_output = Some(output);
        Ok(())
    }

    /// Returns the block produced by the most recent `push`, or `None` if
    /// the filter needs more input first (`FilterStall`, handled by the
    /// caller substituting silence).
    pub fn pull(&mut self) -> Option<AudioBuffer> {
        self.pending_output.take()
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset_state();
        }
        self.pending_output = None;
    }
}

/// Registry of named filter instances, keyed the way spec's
/// `(filter-instance-name, parameter-name, value)` triple addresses them.
#[derive(Default)]
pub struct FilterRegistry {
    instances: HashMap<String, FilterHost>,
}

impl FilterRegistry {
    pub fn insert(&mut self, name: impl Into<String>, host: FilterHost) {
        self.instances.insert(name.into(), host);
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FilterHost> {
        self.instances.get_mut(name)
    }

    pub fn update_parameter(&self, filter: &str, parameter: &str, value: f64) -> Result<()> {
        self.instances
            .get(filter)
            .ok_or_else(|| GraphError::UnknownFilter(filter.to_string()))?
            .update_parameter(parameter, value)
    }
}
