//! Viewer commands.

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A command sent by a viewer, tagged by `action`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Start or resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Move the playback clock. Out-of-range targets are clamped.
    Seek {
        /// Target position in milliseconds.
        time_ms: f64,
    },
    /// Change the replay speed multiplier.
    #[serde(rename = "speed")]
    SetSpeed {
        /// New multiplier.
        speed: f64,
    },
    /// Liveness check; answered with `pong` to the sender only.
    Ping,
    /// Tear the session down for every viewer.
    Stop,
}

impl Command {
    /// Parse one text message.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::MalformedCommand(e.to_string()))
    }

    /// Wire name of the action, used as a metric label.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek { .. } => "seek",
            Self::SetSpeed { .. } => "speed",
            Self::Ping => "ping",
            Self::Stop => "stop",
        }
    }
}
