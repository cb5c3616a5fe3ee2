//! Replay error types.

use pitwall_core::{CoreError, SourceError};
use thiserror::Error;

/// Errors raised while running a replay session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReplayError {
    /// A viewer message could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Requested speed outside the configured bounds.
    #[error("speed {requested} outside allowed range {min}..={max}")]
    InvalidSpeed {
        /// The rejected value.
        requested: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// No recording exists for the requested session.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The telemetry source failed.
    #[error("telemetry unavailable: {0}")]
    TelemetryUnavailable(String),

    /// The command does not apply in the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// Command action name.
        action: &'static str,
        /// Session state name.
        state: &'static str,
    },

    /// The session actor has shut down.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// Too many sessions are already running.
    #[error("session limit reached ({0} running)")]
    CapacityExceeded(usize),

    /// A viewer could not keep up and was disconnected.
    #[error("connection dropped after {0} consecutive queue overflows")]
    BackpressureOverflow(u32),
}

impl ReplayError {
    /// Stable classification string used in `error` events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::InvalidSpeed { .. } => "invalid_speed",
            Self::UnknownSession(_) => "unknown_session",
            Self::TelemetryUnavailable(_) => "telemetry_unavailable",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::SessionClosed(_) => "session_closed",
            Self::CapacityExceeded(_) => "capacity_exceeded",
            Self::BackpressureOverflow(_) => "backpressure_overflow",
        }
    }

    /// Whether the error ends the whole session rather than one command.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TelemetryUnavailable(_) | Self::SessionClosed(_))
    }
}

impl From<CoreError> for ReplayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MalformedCommand(msg) => Self::Protocol(msg),
            other => Self::TelemetryUnavailable(other.to_string()),
        }
    }
}

impl From<SourceError> for ReplayError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(id) => Self::UnknownSession(id),
            SourceError::Unavailable(msg) => Self::TelemetryUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ReplayError::Protocol("x".into()).kind(), "protocol");
        assert_eq!(
            ReplayError::InvalidSpeed { requested: 50.0, min: 0.1, max: 20.0 }.kind(),
            "invalid_speed"
        );
        assert_eq!(ReplayError::CapacityExceeded(3).kind(), "capacity_exceeded");
        assert_eq!(ReplayError::BackpressureOverflow(8).kind(), "backpressure_overflow");
    }

    #[test]
    fn only_session_level_errors_are_fatal() {
        assert!(ReplayError::TelemetryUnavailable("db".into()).is_fatal());
        assert!(ReplayError::SessionClosed("s".into()).is_fatal());
        assert!(!ReplayError::Protocol("x".into()).is_fatal());
        assert!(
            !ReplayError::InvalidTransition { action: "play", state: "finished" }.is_fatal()
        );
    }

    #[test]
    fn invalid_speed_display() {
        let err = ReplayError::InvalidSpeed { requested: 25.0, min: 0.1, max: 20.0 };
        assert_eq!(err.to_string(), "speed 25 outside allowed range 0.1..=20");
    }

    #[test]
    fn converts_core_errors() {
        let err: ReplayError = CoreError::MalformedCommand("bad".into()).into();
        assert_eq!(err, ReplayError::Protocol("bad".into()));
    }

    #[test]
    fn converts_source_errors() {
        let err: ReplayError = SourceError::NotFound("monza".into()).into();
        assert_eq!(err, ReplayError::UnknownSession("monza".into()));
        let err: ReplayError = SourceError::Unavailable("io".into()).into();
        assert!(err.is_fatal());
    }
}
