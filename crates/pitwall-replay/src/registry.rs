//! Session registry: maps session ids to running actors.
//!
//! Sessions are created on first subscribe and removed when stopped, when
//! their actor exits, or when they have had no viewers for longer than the
//! grace period. The map is a sharded [`DashMap`], so sessions with
//! different ids never contend on one lock.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pitwall_core::{ConnectionId, SessionId, TelemetrySource};
use pitwall_settings::ReplaySettings;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::errors::ReplayError;
use crate::session::{SessionConfig, SessionHandle, SessionSnapshot};

/// Registry tuning.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Per-session settings.
    pub session: SessionConfig,
    /// How long a session may sit without viewers.
    pub idle_grace: Duration,
    /// Interval of the idle sweep.
    pub gc_interval: Duration,
    /// Running sessions allowed at once.
    pub max_sessions: usize,
    /// Outbound queue size of new connections.
    pub outbound_capacity: usize,
}

impl RegistryConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &ReplaySettings) -> Self {
        Self {
            session: SessionConfig::from_settings(settings),
            idle_grace: settings.idle_grace(),
            gc_interval: settings.gc_interval(),
            max_sessions: settings.max_concurrent_sessions.max(1),
            outbound_capacity: settings.outbound_queue_capacity.max(1),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::from_settings(&ReplaySettings::default())
    }
}

/// Lifecycle manager for every session of the process.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    source: Arc<dyn TelemetrySource>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Empty registry reading from `source`.
    pub fn new(source: Arc<dyn TelemetrySource>, config: RegistryConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            source,
            config,
        }
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Handshake check: the session is running or can be started.
    pub async fn check_session(&self, session_id: &SessionId) -> Result<(), ReplayError> {
        if self.live(session_id).is_some() {
            return Ok(());
        }
        match self.source.exists(session_id).await {
            Ok(true) => {}
            Ok(false) => return Err(ReplayError::UnknownSession(session_id.to_string())),
            Err(e) => return Err(ReplayError::TelemetryUnavailable(e.to_string())),
        }
        let running = self.active_count();
        if running >= self.config.max_sessions {
            return Err(ReplayError::CapacityExceeded(running));
        }
        Ok(())
    }

    /// New connection for `session_id` with the configured queue size.
    pub fn new_connection(&self, session_id: SessionId) -> Arc<Connection> {
        Arc::new(Connection::new(session_id, self.config.outbound_capacity))
    }

    /// Attach a connection to its session, starting the session if needed.
    pub async fn subscribe(
        &self,
        connection: Arc<Connection>,
    ) -> Result<Arc<SessionHandle>, ReplayError> {
        let session_id = connection.session_id.clone();
        let handle = match self.live(&session_id) {
            Some(handle) => handle,
            None => self.start(&session_id)?,
        };
        handle.join(connection).await?;
        Ok(handle)
    }

    /// Detach a connection and close its queue.
    pub fn unsubscribe(&self, session_id: &SessionId, connection_id: &ConnectionId) {
        let handle = self.sessions.get(session_id).map(|h| Arc::clone(h.value()));
        if let Some(handle) = handle {
            handle.leave(connection_id);
            debug!(%session_id, conn_id = %connection_id, viewers = handle.viewer_count(), "viewer left");
        }
    }

    /// Tear a session down. Returns whether it was running.
    pub fn stop(&self, session_id: &SessionId) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, handle)) => {
                info!(%session_id, "stopping session");
                handle.shutdown();
                true
            }
            None => false,
        }
    }

    /// Running session, if any.
    pub fn get(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.live(session_id)
    }

    /// Sessions whose actor is still running.
    pub fn active_count(&self) -> usize {
        self.sessions.iter().filter(|e| !e.value().is_closed()).count()
    }

    /// Viewers across all sessions.
    pub fn connection_count(&self) -> usize {
        self.sessions.iter().map(|e| e.value().viewer_count()).sum()
    }

    /// Remove closed sessions and sessions idle past the grace period.
    /// Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let grace = self.config.idle_grace;
        let mut expired = Vec::new();
        self.sessions.retain(|id, handle| {
            let idle = handle.idle_for(now).is_some_and(|d| d >= grace);
            if handle.is_closed() || idle {
                expired.push((id.clone(), Arc::clone(handle), idle));
                false
            } else {
                true
            }
        });
        for (id, handle, idle) in &expired {
            if *idle {
                info!(session_id = %id, grace_ms = grace.as_millis(), "tearing down idle session");
            } else {
                debug!(session_id = %id, "removing closed session");
            }
            handle.shutdown();
        }
        expired.len()
    }

    /// Run [`sweep`](Self::sweep) every `gc_interval` until cancelled.
    pub fn spawn_gc(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(registry.config.gc_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let _ = ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep(Instant::now());
                        if removed > 0 {
                            debug!(removed, remaining = registry.sessions.len(), "session sweep");
                        }
                    }
                }
            }
        })
    }

    /// Remove and cancel every session without waiting on their actors.
    /// The returned handles can be awaited with [`SessionHandle::wait`].
    pub fn stop_all(&self) -> Vec<Arc<SessionHandle>> {
        let ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        let mut stopped = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, handle)) = self.sessions.remove(&id) {
                handle.shutdown();
                stopped.push(handle);
            }
        }
        stopped
    }

    /// Latest snapshot of every running session.
    pub fn snapshots(&self) -> Vec<(SessionId, SessionSnapshot)> {
        self.sessions
            .iter()
            .filter(|e| !e.value().is_closed())
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect()
    }

    fn live(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions
            .get(session_id)
            .map(|h| Arc::clone(h.value()))
            .filter(|h| !h.is_closed())
    }

    /// Spawn a session, or return one a concurrent subscriber just started.
    fn start(&self, session_id: &SessionId) -> Result<Arc<SessionHandle>, ReplayError> {
        // Counted before taking the entry: iterating while holding a shard
        // write lock would deadlock.
        let running = self.active_count();
        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_closed() {
                    return Ok(Arc::clone(entry.get()));
                }
                if running >= self.config.max_sessions {
                    return Err(ReplayError::CapacityExceeded(running));
                }
                let handle = self.spawn_session(session_id);
                let _ = entry.insert(Arc::clone(&handle));
                Ok(handle)
            }
            Entry::Vacant(entry) => {
                if running >= self.config.max_sessions {
                    warn!(%session_id, running, "session limit reached");
                    return Err(ReplayError::CapacityExceeded(running));
                }
                let handle = self.spawn_session(session_id);
                let _ = entry.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    fn spawn_session(&self, session_id: &SessionId) -> Arc<SessionHandle> {
        info!(%session_id, "starting session");
        SessionHandle::spawn(
            session_id.clone(),
            Arc::clone(&self.source),
            self.config.session.clone(),
        )
    }
}
