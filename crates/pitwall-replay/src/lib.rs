//! # pitwall-replay
//!
//! The replay engine. One actor per session owns the playback clock and
//! ticks it at a fixed rate; each tick interpolates every driver and fans
//! the resulting frame out to viewer queues without waiting on any socket.
//!
//! - [`state`]: the playback state machine, pure and synchronous
//! - [`session`]: the actor that owns a [`state::Replay`] and its tick loop
//! - [`broadcast`], [`connection`], [`queue`]: bounded per-viewer delivery
//! - [`registry`]: session lifecycle and idle collection

#![deny(unsafe_code)]

pub mod broadcast;
pub mod connection;
pub mod errors;
pub mod frames;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use connection::{Connection, SendOutcome};
pub use errors::ReplayError;
pub use frames::SessionTelemetry;
pub use registry::{RegistryConfig, SessionRegistry};
pub use session::{SessionConfig, SessionHandle, SessionSnapshot};
pub use state::{PlaybackClock, Replay, SessionState, SpeedLimits, TickOutcome};
