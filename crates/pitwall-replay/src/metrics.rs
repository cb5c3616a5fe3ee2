//! Metric names recorded by the replay engine.
//!
//! The recorder itself is installed by the server binary; without one every
//! macro call is a no-op.

/// Sessions with a running actor (gauge).
pub const SESSIONS_ACTIVE: &str = "replay_sessions_active";
/// Frames broadcast (counter).
pub const FRAMES_TOTAL: &str = "replay_frames_total";
/// Outbound messages evicted from full viewer queues (counter).
pub const FRAMES_DROPPED_TOTAL: &str = "replay_frames_dropped_total";
/// Viewers pruned for falling behind or closing (counter).
pub const CONNECTIONS_PRUNED_TOTAL: &str = "replay_connections_pruned_total";
/// Commands received (counter, labels: action).
pub const COMMANDS_TOTAL: &str = "replay_commands_total";
