//! # pitwall-server
//!
//! Axum HTTP + `WebSocket` gateway in front of the replay engine.
//!
//! - `GET /ws/replay/{session_id}`: viewer socket, rejected before upgrade
//!   when the session is unknown or the server is at capacity
//! - `GET /health` and `GET /metrics`
//! - Ping/pong liveness per socket and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ServerConfig;
pub use server::{AppState, ReplayServer};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
