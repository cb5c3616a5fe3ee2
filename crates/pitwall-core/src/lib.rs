//! # pitwall-core
//!
//! Shared vocabulary for the replay system.
//!
//! - Branded identifiers for sessions and viewer connections
//! - Telemetry data model: channels, samples, time-ordered series
//! - The interpolator that turns a series into a value at any timestamp
//! - Viewer commands and the server event envelope sent back over the wire
//! - The read-only [`source::TelemetrySource`] collaborator interface

#![deny(unsafe_code)]

pub mod command;
pub mod errors;
pub mod events;
pub mod frame;
pub mod ids;
pub mod interpolate;
pub mod source;
pub mod telemetry;

pub use command::Command;
pub use errors::{CoreError, SourceError};
pub use events::{ErrorData, InitData, ServerEvent, StatusData};
pub use frame::{CarSnapshot, Frame, format_elapsed};
pub use ids::{ConnectionId, SessionId};
pub use interpolate::{numeric_at, value_at};
pub use source::{
    InMemorySource, IndexedSession, RecordedDriver, RecordedSession, SessionInfo, TelemetrySource,
};
pub use telemetry::{Channel, ChannelKind, DriverInfo, Sample, SampleValue, TelemetrySeries};
