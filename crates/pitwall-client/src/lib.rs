//! # pitwall-client
//!
//! Viewer-side connection to a replay session.
//!
//! The reconnection logic is a pure state machine ([`machine`]) fed by a
//! small tokio driver ([`client`]); the backoff math and the heartbeat
//! bookkeeping are synchronous and testable without a socket.

#![deny(unsafe_code)]

pub mod backoff;
pub mod client;
pub mod errors;
pub mod heartbeat;
pub mod machine;

pub use backoff::ReconnectPolicy;
pub use client::{ClientEvent, ClientOptions, ReplayClient};
pub use errors::ClientError;
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use machine::{Effect, ReconnectEvent, ReconnectMachine, ReconnectState, transition};
