//! Viewer sockets: inbound command decoding, heartbeat and session lifecycle.

pub mod handler;
pub mod heartbeat;
pub mod session;
