//! Server configuration.

use std::time::Duration;

use pitwall_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the replay gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Interval between server-initiated Ping frames, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a socket after this long without any inbound traffic.
    pub heartbeat_timeout_ms: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Time allowed for the listener and sessions to stop.
    pub shutdown_timeout_ms: u64,
}

impl ServerConfig {
    /// Gateway configuration from the `server` settings section.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            heartbeat_interval_ms: settings.heartbeat_interval_ms,
            heartbeat_timeout_ms: settings.heartbeat_timeout_ms,
            max_message_size: settings.max_message_size,
            shutdown_timeout_ms: settings.shutdown_timeout_ms,
        }
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// Silence allowed before a socket is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Shutdown budget.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_ms: 15_000,
            heartbeat_timeout_ms: 45_000,
            max_message_size: 64 * 1024,
            shutdown_timeout_ms: 10_000,
        }
    }
}
