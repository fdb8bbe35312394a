//! In-memory form of the declarative configuration document spec.md §6
//! describes. Parsing the document itself (TOML/JSON/whatever a host
//! chooses) is out of scope; this struct is what a parser would hand the
//! engine, and what `engine.load_config` consumes directly.
//!
//! Grounded on `sonido-config`/`rf-engine`'s practice of deriving
//! `serde::{Serialize, Deserialize}` straight on the graph-configuration
//! struct so a caller can round-trip it through any format crate without
//! this crate depending on one beyond a dev-dependency test.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use sp_core::pool::{BufferFormat, ChannelLayout};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    HardwareSource,
    HardwareSink,
    FileSource,
    FileSink,
    FilterProcessor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicyConfig {
    Move,
    SharedRef,
    Auto,
}

fn default_buffer_policy() -> BufferPolicyConfig {
    BufferPolicyConfig::Auto
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormatConfig {
    #[default]
    F32,
    F64,
    S16,
    S24,
    S32,
}

impl SampleFormatConfig {
    pub fn to_buffer_format(self) -> BufferFormat {
        match self {
            SampleFormatConfig::F32 => BufferFormat::F32,
            SampleFormatConfig::F64 => BufferFormat::F64,
            SampleFormatConfig::S16 => BufferFormat::S16,
            SampleFormatConfig::S24 => BufferFormat::S24In32,
            SampleFormatConfig::S32 => BufferFormat::S32,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayoutConfig {
    Mono,
    #[default]
    Stereo,
    Surround51,
    Surround71,
}

impl ChannelLayoutConfig {
    pub fn to_channel_layout(self) -> ChannelLayout {
        match self {
            ChannelLayoutConfig::Mono => ChannelLayout::Mono,
            ChannelLayoutConfig::Stereo => ChannelLayout::Stereo,
            ChannelLayoutConfig::Surround51 => ChannelLayout::Surround51,
            ChannelLayoutConfig::Surround71 => ChannelLayout::Surround71,
        }
    }
}

/// One entry of `Configuration::nodes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Opaque string-keyed parameter map (spec.md §3 "Node").
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub input_pads: usize,
    #[serde(default)]
    pub output_pads: usize,
    /// `filter_processor`'s `graph_description`; unused by other kinds.
    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of `Configuration::connections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub source_name: String,
    #[serde(default)]
    pub source_pad: usize,
    pub sink_name: String,
    #[serde(default)]
    pub sink_pad: usize,
    #[serde(default)]
    pub allow_format_conversion: bool,
    #[serde(default = "default_buffer_policy")]
    pub buffer_policy: BufferPolicyConfig,
}

/// One entry of `Configuration::initial_control_commands`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlCommandConfig {
    pub address: String,
    #[serde(default)]
    pub args: Vec<f32>,
}

/// The in-memory form of the declarative document spec.md §6 names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub sample_rate: u32,
    #[serde(default)]
    pub buffer_size: usize,
    #[serde(default)]
    pub internal_format: SampleFormatConfig,
    #[serde(default)]
    pub internal_layout: ChannelLayoutConfig,
    #[serde(default)]
    pub auto_configure: bool,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub initial_control_commands: Vec<ControlCommandConfig>,
}

impl Configuration {
    /// Checks the document-level invariants spec.md §7's "Configuration
    /// error" names: unique node names, connections naming nodes that
    /// exist. Pad-range and cycle checks happen once the graph is built,
    /// where the node/pad contracts actually live.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(EngineError::Configuration(format!("node name `{}` is not unique", node.name)));
            }
        }

        for conn in &self.connections {
            if !seen.contains(conn.source_name.as_str()) {
                return Err(EngineError::Configuration(format!("connection references unknown node `{}`", conn.source_name)));
            }
            if !seen.contains(conn.sink_name.as_str()) {
                return Err(EngineError::Configuration(format!("connection references unknown node `{}`", conn.sink_name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Configuration {
        Configuration {
            device_name: "default".into(),
            sample_rate: 48_000,
            buffer_size: 256,
            internal_format: SampleFormatConfig::F32,
            internal_layout: ChannelLayoutConfig::Stereo,
            auto_configure: true,
            nodes: vec![
                NodeConfig { name: "in".into(), kind: NodeKind::HardwareSource, params: BTreeMap::from([("channels".into(), "0,1".into())]), input_pads: 0, output_pads: 1, description: None },
                NodeConfig { name: "out".into(), kind: NodeKind::HardwareSink, params: BTreeMap::from([("channels".into(), "0,1".into())]), input_pads: 1, output_pads: 0, description: None },
            ],
            connections: vec![ConnectionConfig { source_name: "in".into(), source_pad: 0, sink_name: "out".into(), sink_pad: 0, allow_format_conversion: false, buffer_policy: BufferPolicyConfig::Move }],
            initial_control_commands: vec![ControlCommandConfig { address: "/blocks/param/gain".into(), args: vec![0.5] }],
        }
    }

    #[test]
    fn rejects_duplicate_node_names() {
        let mut config = sample();
        config.nodes.push(NodeConfig { name: "in".into(), kind: NodeKind::HardwareSink, params: BTreeMap::new(), input_pads: 1, output_pads: 0, description: None });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_connection_to_unknown_node() {
        let mut config = sample();
        config.connections[0].sink_name = "missing".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_document() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = sample();
        let text = toml::to_string(&config).unwrap();
        let back: Configuration = toml::from_str(&text).unwrap();
        assert_eq!(back.nodes.len(), config.nodes.len());
        assert_eq!(back.connections.len(), config.connections.len());
    }

    #[test]
    fn round_trips_through_json() {
        let config = sample();
        let text = serde_json::to_string(&config).unwrap();
        let back: Configuration = serde_json::from_str(&text).unwrap();
        assert_eq!(back.device_name, config.device_name);
        assert_eq!(back.internal_layout, config.internal_layout);
    }
}
