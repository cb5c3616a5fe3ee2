//! Heartbeat liveness monitoring.

use std::sync::Arc;
use std::time::Duration;

use pitwall_replay::Connection;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The viewer stopped responding within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch a connection's alive flag.
///
/// At each `interval` tick the flag is checked and cleared. Any inbound
/// traffic (including Pong frames) sets it again. After `timeout / interval`
/// consecutive silent ticks (at least one) the viewer is considered dead.
pub async fn run_heartbeat(
    connection: Arc<Connection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    let mut missed: u32 = 0;
    let interval_ms = interval.as_millis().max(1);
    let max_missed = u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(1);

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
