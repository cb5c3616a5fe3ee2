//! Two-phase server shutdown.
//!
//! Cancelling the token stops the listener, the session sweeper and every
//! viewer socket. Once the listener task has returned, every replay session
//! is cancelled and its actor awaited so that viewer queues are closed
//! before the process exits. Both phases share one deadline.

use std::time::Duration;

use futures::future::join_all;
use pitwall_replay::SessionRegistry;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of [`ShutdownCoordinator::drain`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The listener task returned before the deadline.
    pub listener_stopped: bool,
    /// Sessions whose actor exited before the deadline.
    pub sessions_stopped: usize,
    /// Sessions still running at the deadline.
    pub sessions_abandoned: usize,
}

impl ShutdownReport {
    /// Everything stopped in time.
    pub fn is_clean(&self) -> bool {
        self.listener_stopped && self.sessions_abandoned == 0
    }
}

/// Owns the server-wide cancellation token and the shutdown budget.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    timeout: Duration,
}

impl ShutdownCoordinator {
    /// Coordinator allowing `timeout` for a full drain.
    pub fn new(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            timeout,
        }
    }

    /// Token observed by the listener, the sweeper and every socket.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Budget for [`drain`](Self::drain).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stop taking viewers. Idempotent.
    pub fn begin(&self) {
        self.token.cancel();
    }

    /// Whether [`begin`](Self::begin) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop the listener, then every session of `registry`.
    ///
    /// Sessions are cancelled even when the listener misses the deadline;
    /// their actors are only awaited for whatever budget remains.
    pub async fn drain(
        &self,
        listener: JoinHandle<()>,
        registry: &SessionRegistry,
    ) -> ShutdownReport {
        let deadline = Instant::now() + self.timeout;
        self.begin();

        let listener_stopped = match time::timeout_at(deadline, listener).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "listener task failed");
                true
            }
            Err(_) => {
                warn!("listener still running at shutdown deadline");
                false
            }
        };

        let sessions = registry.stop_all();
        let waits = sessions
            .iter()
            .map(|handle| time::timeout_at(deadline, handle.wait()));
        let abandoned = join_all(waits).await.iter().filter(|r| r.is_err()).count();

        let report = ShutdownReport {
            listener_stopped,
            sessions_stopped: sessions.len() - abandoned,
            sessions_abandoned: abandoned,
        };
        if report.is_clean() {
            info!(sessions = report.sessions_stopped, "shutdown complete");
        } else {
            warn!(
                listener_stopped,
                sessions_stopped = report.sessions_stopped,
                sessions_abandoned = abandoned,
                timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                "shutdown deadline reached"
            );
        }
        report
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}
