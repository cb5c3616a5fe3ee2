//! Server → viewer event envelope.
//!
//! Every event serializes as `{"type": "...", "data": {...}}`; variants
//! without a payload omit `data`.

use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::ids::SessionId;
use crate::telemetry::DriverInfo;

/// Event sent to viewers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Session metadata, sent on subscribe and when loading completes.
    Init(InitData),
    /// Snapshot for one tick.
    Frame(Frame),
    /// Playback clock state after a command.
    Status(StatusData),
    /// Playback reached the end of the session. Sent once.
    Finished,
    /// The session was stopped and is being torn down.
    Stopped,
    /// Reply to `ping`.
    Pong,
    /// A command or the session failed.
    Error(ErrorData),
}

impl ServerEvent {
    /// Error event from a reason and a machine-readable kind.
    pub fn error(reason: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::Error(ErrorData {
            reason: reason.into(),
            kind: kind.into(),
        })
    }

    /// Wire name of the event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Frame(_) => "frame",
            Self::Status(_) => "status",
            Self::Finished => "finished",
            Self::Stopped => "stopped",
            Self::Pong => "pong",
            Self::Error(_) => "error",
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of `init`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitData {
    /// Session being replayed.
    pub session_id: SessionId,
    /// Total length of the recording.
    pub duration_ms: f64,
    /// Number of drivers in the roster.
    pub driver_count: usize,
    /// Driver roster.
    pub drivers: Vec<DriverInfo>,
    /// Whether any driver has at least one recorded channel.
    pub has_telemetry: bool,
    /// Scheduled race distance in laps, when the recording carries it.
    #[serde(default)]
    pub total_laps: Option<u32>,
    /// Frames per second the server ticks at.
    pub tick_rate_hz: u32,
}

/// Payload of `status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    /// Lifecycle state name, e.g. `playing`.
    pub state: String,
    /// Whether the clock is advancing.
    pub is_playing: bool,
    /// Speed multiplier.
    pub speed: f64,
    /// Playback position.
    pub current_time_ms: f64,
    /// Total length of the recording.
    pub duration_ms: f64,
}

/// Payload of `error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Human-readable reason.
    pub reason: String,
    /// Machine-readable classification.
    pub kind: String,
}
