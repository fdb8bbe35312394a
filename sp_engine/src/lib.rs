//! Engine lifecycle, configuration, and event delivery tying the graph,
//! file, net, and hardware crates together (spec.md §4.6).
//!
//! - [`config::Configuration`] is the in-memory form of the declarative
//!   document spec.md §6 describes; parsing text into it is out of scope.
//! - [`engine::Engine`] owns construction, the realtime tick, live
//!   parameter updates, and shutdown.
//! - [`events::EngineEvent`] is delivered through a lock-free ring
//!   (`events::event_ring`) drained by `Engine::subscribe_events` on the
//!   control thread only.
//! - [`error::EngineError`] aggregates every collaborator crate's error
//!   type via `#[from]`.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;

pub use config::Configuration;
pub use engine::{driver_callback, ControlSend, Engine, EngineState};
pub use error::{EngineError, Result};
pub use events::{event_ring, EngineEvent};
