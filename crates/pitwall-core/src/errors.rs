//! Core error types.

use thiserror::Error;

/// Errors raised while building telemetry or parsing viewer input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Sample timestamps must be strictly increasing.
    #[error("sample {index} at {current}ms is not after previous sample at {previous}ms")]
    UnorderedSamples {
        /// Position of the offending sample.
        index: usize,
        /// Timestamp of the sample before it.
        previous: f64,
        /// Timestamp of the offending sample.
        current: f64,
    },
    /// A sample timestamp was NaN or infinite.
    #[error("sample {index} has a non-finite timestamp")]
    NonFiniteTimestamp {
        /// Position of the offending sample.
        index: usize,
    },
    /// A viewer message could not be parsed as a command.
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

/// Failures reported by a telemetry source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source has no session with this identifier.
    #[error("session not found: {0}")]
    NotFound(String),
    /// The source exists but could not serve the request.
    #[error("telemetry unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
