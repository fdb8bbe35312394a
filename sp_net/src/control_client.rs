//! Out-of-band mixer control transport.
//!
//! Grounded on `osc::server`'s socket setup and `osc::parser`'s decode path,
//! generalized from receive-only into a client that also sends and can await
//! a reply on the same UDP socket. Used only from the control thread: one-shot
//! commands at startup (`initial_control_commands`) and live parameter nudges.

use std::{
    net::{SocketAddr, UdpSocket},
    time::Duration,
};

use rosc::{OscMessage, OscPacket, OscType, encoder};

use crate::{
    address::NodeId,
    error::{NetError, Result},
    osc::parse_osc_message,
};

/// Configuration for a [`ControlClient`].
pub struct ControlClientConfig {
    /// Address of the external mixer to control.
    pub remote_addr: SocketAddr,
    /// Local address to bind the client's socket to.
    pub bind_addr: SocketAddr,
    /// This node's ID, attached to outgoing messages.
    pub node_id: NodeId,
    /// Number of additional attempts after the first `send` fails.
    pub max_send_retries: u32,
    /// Deadline for `query`'s reply.
    pub query_timeout: Duration,
}

impl Default for ControlClientConfig {
    fn default() -> Self {
        Self {
            remote_addr: "127.0.0.1:9001".parse().unwrap(),
            bind_addr: "0.0.0.0:0".parse().unwrap(),
            node_id: NodeId::default(),
            max_send_retries: 2,
            query_timeout: Duration::from_millis(500),
        }
    }
}

/// OSC-based client for the external mixer's control plane.
///
/// `send` is fire-and-forget with bounded retry on transport error. `query`
/// sends a request and blocks for a reply up to `query_timeout`. Neither
/// operation is realtime-safe; both are called only from the control thread.
pub struct ControlClient {
    config: ControlClientConfig,
    socket: UdpSocket,
}

impl ControlClient {
    /// Bind a socket and connect it to the configured remote mixer address.
    pub fn connect(config: ControlClientConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.bind_addr)?;
        socket.connect(config.remote_addr)?;
        Ok(Self { config, socket })
    }

    /// Send a command to `address` with bounded retry on transport error.
    ///
    /// Does not wait for a reply; a successful return means the datagram was
    /// handed to the OS, not that the mixer acted on it.
    pub fn send(&self, address: &str, args: &[f32]) -> Result<()> {
        let bytes = encode_message(address, args)?;

        let mut last_err = None;
        for _ in 0..=self.config.max_send_retries {
            match self.socket.send(&bytes) {
                Ok(_) => return Ok(()),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.map(NetError::from).unwrap_or(NetError::IoError))
    }

    /// Request the current value at `address` and wait for a reply.
    ///
    /// Returns `NetError::Timeout` if no reply arrives within
    /// `query_timeout`. The deadline is per-call and not fatal to the caller.
    pub fn query(&self, address: &str) -> Result<f32> {
        let bytes = encode_message(address, &[])?;
        self.socket.send(&bytes)?;

        self.socket.set_read_timeout(Some(self.config.query_timeout))?;
        let mut buf = [0u8; 1024];
        let len = match self.socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if is_timeout(&e) => return Err(NetError::Timeout),
            Err(e) => return Err(NetError::from(e)),
        };

        let messages = parse_osc_message(&buf[..len], self.config.node_id)?;
        messages.first().and_then(|m| m.payload.value()).ok_or(NetError::ParseError)
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
}

fn encode_message(address: &str, args: &[f32]) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(OscMessage { addr: address.to_string(), args: args.iter().map(|v| OscType::Float(*v)).collect() });
    encoder::encode(&packet).map_err(|_| NetError::ParseError)
}
