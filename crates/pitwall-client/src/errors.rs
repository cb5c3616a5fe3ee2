//! Client error types.

use thiserror::Error;

/// Errors surfaced to the caller of [`crate::ReplayClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The WebSocket handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection task has exited; no further commands are accepted.
    #[error("client closed")]
    Closed,

    /// Reconnection was abandoned after the configured number of attempts.
    #[error("gave up after {0} reconnect attempts")]
    GaveUp(u32),

    /// A command could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ClientError {
    /// Stable classification string for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Closed => "closed",
            Self::GaveUp(_) => "gave_up",
            Self::Encode(_) => "encode",
        }
    }

    /// Whether the client can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed | Self::GaveUp(_))
    }
}
