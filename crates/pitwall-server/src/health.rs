//! `/health` endpoint: liveness plus a summary of running replays.

use std::collections::BTreeMap;
use std::time::Instant;

use pitwall_replay::SessionRegistry;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"shutting_down"` once shutdown has begun.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Viewer sockets attached to a session.
    pub connections: usize,
    /// Replay sessions currently running.
    pub active_sessions: usize,
    /// Running sessions whose clock is advancing.
    pub playing_sessions: usize,
    /// Running sessions per lifecycle state (`loading`, `ready`, ...).
    pub sessions_by_state: BTreeMap<&'static str, usize>,
}

/// Summarise `registry` for the health endpoint.
pub fn health_check(
    start_time: Instant,
    registry: &SessionRegistry,
    shutting_down: bool,
) -> HealthResponse {
    let snapshots = registry.snapshots();
    let mut sessions_by_state = BTreeMap::new();
    let mut playing_sessions = 0;
    for (_, snapshot) in &snapshots {
        *sessions_by_state.entry(snapshot.state.name()).or_insert(0) += 1;
        if snapshot.state.is_playing() {
            playing_sessions += 1;
        }
    }
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" },
        uptime_secs: start_time.elapsed().as_secs(),
        connections: registry.connection_count(),
        active_sessions: snapshots.len(),
        playing_sessions,
        sessions_by_state,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::test_support::monza_source;
    use pitwall_core::{Command, SessionId};
    use pitwall_replay::{RegistryConfig, SessionState};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(monza_source(), RegistryConfig::default())
    }

    #[test]
    fn idle_server_is_ok() {
        let resp = health_check(Instant::now(), &registry(), false);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
        assert_eq!(resp.active_sessions, 0);
        assert!(resp.sessions_by_state.is_empty());
    }

    #[test]
    fn uptime_counts_from_start() {
        let start = Instant::now().checked_sub(Duration::from_secs(60)).unwrap();
        let resp = health_check(start, &registry(), false);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn shutting_down_is_reported() {
        let resp = health_check(Instant::now(), &registry(), true);
        assert_eq!(resp.status, "shutting_down");
    }

    #[tokio::test]
    async fn counts_sessions_by_state() {
        let reg = registry();
        let conn = reg.new_connection(SessionId::from_raw("monza"));
        let handle = reg.subscribe(Arc::clone(&conn)).await.unwrap();
        // The greeting is only queued once the viewer has been added.
        let init = conn.next_outbound().await.unwrap();
        assert!(init.contains("\"init\""));
        let mut watch = handle.watch();
        let _ = watch.wait_for(|s| s.state == SessionState::Ready).await.unwrap();

        let resp = health_check(Instant::now(), &reg, false);
        assert_eq!(resp.connections, 1);
        assert_eq!(resp.active_sessions, 1);
        assert_eq!(resp.playing_sessions, 0);
        assert_eq!(resp.sessions_by_state.get("ready"), Some(&1));

        handle.command(&conn.id, Command::Play).await.unwrap();
        let _ = watch.wait_for(|s| s.state.is_playing()).await.unwrap();
        let resp = health_check(Instant::now(), &reg, false);
        assert_eq!(resp.playing_sessions, 1);
        assert_eq!(resp.sessions_by_state.get("playing"), Some(&1));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["sessions_by_state"]["playing"], 1);
        assert_eq!(json["playing_sessions"], 1);
    }
}
