//! Session actor: the single owner of a session's playback state.
//!
//! Every mutation of the clock happens on the actor task. Viewers reach it
//! only through [`SessionHandle`], which forwards commands over a channel,
//! so commands from many sockets are applied one at a time between ticks.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use pitwall_core::{
    Command, ConnectionId, ServerEvent, SessionId, StatusData, TelemetrySource,
};
use pitwall_settings::ReplaySettings;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::broadcast::Broadcaster;
use crate::connection::Connection;
use crate::errors::ReplayError;
use crate::frames::SessionTelemetry;
use crate::metrics::{COMMANDS_TOTAL, FRAMES_TOTAL, SESSIONS_ACTIVE};
use crate::state::{Replay, SessionState, SpeedLimits, TickOutcome};

/// Per-session tuning.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Wall-clock time between ticks.
    pub tick_interval: Duration,
    /// Advertised in `init`.
    pub tick_rate_hz: u32,
    /// Accepted speed range.
    pub limits: SpeedLimits,
    /// Commands buffered before senders wait.
    pub command_capacity: usize,
    /// Overflow streak that prunes a viewer.
    pub max_consecutive_overflows: u32,
}

impl SessionConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &ReplaySettings) -> Self {
        Self {
            tick_interval: settings.tick_interval(),
            tick_rate_hz: settings.tick_rate_hz,
            limits: SpeedLimits {
                min: settings.min_speed,
                max: settings.max_speed,
            },
            command_capacity: settings.command_queue_capacity.max(1),
            max_consecutive_overflows: settings.max_consecutive_overflows,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&ReplaySettings::default())
    }
}

/// Read-only view of the actor's state, published after every change.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    /// Lifecycle state.
    pub state: SessionState,
    /// Playback position.
    pub current_time_ms: f64,
    /// Speed multiplier.
    pub speed: f64,
    /// Recording length (0 while loading).
    pub duration_ms: f64,
}

impl SessionSnapshot {
    fn of(replay: &Replay) -> Self {
        let clock = replay.clock();
        Self {
            state: replay.state().clone(),
            current_time_ms: clock.current_time_ms(),
            speed: clock.speed(),
            duration_ms: replay.duration_ms(),
        }
    }
}

enum SessionMessage {
    Join(Arc<Connection>),
    Command {
        from: ConnectionId,
        command: Command,
    },
}

/// Handle to a running session actor.
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<SessionMessage>,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("state", &self.snapshot.borrow().state)
            .field("viewers", &self.broadcaster.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Spawn the actor. Telemetry is fetched on the actor task; the source
    /// reference is released once loading ends.
    pub fn spawn(
        id: SessionId,
        source: Arc<dyn TelemetrySource>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let broadcaster = Arc::new(Broadcaster::new(
            id.clone(),
            config.max_consecutive_overflows,
        ));
        let cancel = CancellationToken::new();
        let replay = Replay::new(config.limits, config.tick_interval.as_secs_f64() * 1000.0);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::of(&replay));

        let actor = SessionActor {
            id: id.clone(),
            config,
            replay,
            telemetry: None,
            broadcaster: Arc::clone(&broadcaster),
            cancel: cancel.clone(),
            snapshot: snapshot_tx,
        };
        let task = tokio::spawn(actor.run(source, rx));

        Arc::new(Self {
            id,
            tx,
            broadcaster,
            cancel,
            snapshot: snapshot_rx,
            task: Mutex::new(Some(task)),
        })
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Subscribe a viewer. The actor greets it with `init`, `status` and
    /// the current frame before it receives broadcasts.
    pub async fn join(&self, connection: Arc<Connection>) -> Result<(), ReplayError> {
        self.broadcaster.mark_active();
        self.tx
            .send(SessionMessage::Join(connection))
            .await
            .map_err(|_| ReplayError::SessionClosed(self.id.to_string()))
    }

    /// Unsubscribe a viewer and close its queue. A viewer whose join is
    /// still queued on the actor is refused when the actor reaches it.
    pub fn leave(&self, connection_id: &ConnectionId) {
        if let Some(conn) = self.broadcaster.leave(connection_id) {
            conn.close();
        }
    }

    /// Forward a command to the actor.
    pub async fn command(&self, from: &ConnectionId, command: Command) -> Result<(), ReplayError> {
        self.tx
            .send(SessionMessage::Command {
                from: from.clone(),
                command,
            })
            .await
            .map_err(|_| ReplayError::SessionClosed(self.id.to_string()))
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Current subscriber count.
    pub fn viewer_count(&self) -> usize {
        self.broadcaster.len()
    }

    /// How long the session has had no viewers, if it has none.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.broadcaster.idle_for(now)
    }

    /// Whether the actor has stopped or been told to stop.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the session is shutting down.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Cancel the tick loop. Viewer queues are closed by the actor.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the actor task to exit.
    pub async fn wait(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(session_id = %self.id, error = %e, "session task failed");
            }
        }
    }
}

struct SessionActor {
    id: SessionId,
    config: SessionConfig,
    replay: Replay,
    telemetry: Option<SessionTelemetry>,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionActor {
    #[instrument(skip_all, fields(session_id = %self.id))]
    async fn run(mut self, source: Arc<dyn TelemetrySource>, mut rx: mpsc::Receiver<SessionMessage>) {
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        let ready = self.load(source.as_ref(), &mut rx).await;
        source.release(&self.id).await;
        drop(source);
        if ready {
            self.tick_loop(&mut rx).await;
        }
        self.broadcaster.close_all(None);
        self.cancel.cancel();
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
        debug!("session torn down");
    }

    /// Fetch telemetry while still answering commands. Returns whether the
    /// session reached `Ready`.
    async fn load(
        &mut self,
        source: &dyn TelemetrySource,
        rx: &mut mpsc::Receiver<SessionMessage>,
    ) -> bool {
        let cancel = self.cancel.clone();
        let id = self.id.clone();
        let fetch = SessionTelemetry::load(source, &id);
        tokio::pin!(fetch);

        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                result = &mut fetch => break result,
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        if !self.handle(msg) {
                            return false;
                        }
                    }
                    None => return false,
                },
            }
        };

        match result {
            Ok(telemetry) => {
                self.replay.ready(telemetry.duration_ms());
                let init = telemetry.init_data(&self.id, self.config.tick_rate_hz);
                info!(
                    duration_ms = telemetry.duration_ms(),
                    drivers = init.driver_count,
                    "session ready"
                );
                self.telemetry = Some(telemetry);
                self.publish();
                let _ = self.broadcaster.broadcast(&ServerEvent::Init(init));
                let _ = self.broadcaster.broadcast(&self.status_event());
                self.emit_frame(self.replay.clock().current_time_ms());
                true
            }
            Err(e) => {
                let err = ReplayError::TelemetryUnavailable(e.to_string());
                warn!(error = %e, kind = e.kind(), "failed to load telemetry");
                self.replay.fail(e.to_string());
                self.publish();
                self.broadcaster
                    .close_all(Some(&ServerEvent::error(err.to_string(), err.kind())));
                false
            }
        }
    }

    async fn tick_loop(&mut self, rx: &mut mpsc::Receiver<SessionMessage>) {
        let cancel = self.cancel.clone();
        let mut ticker = time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        if !self.handle(msg) {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.on_tick(),
            }
        }
    }

    /// Returns `false` when the session must stop.
    fn handle(&mut self, msg: SessionMessage) -> bool {
        match msg {
            SessionMessage::Join(conn) => {
                if self.broadcaster.add(Arc::clone(&conn)) {
                    self.welcome(&conn);
                    debug!(conn_id = %conn.id, "viewer joined");
                } else {
                    debug!(conn_id = %conn.id, "viewer left before joining");
                }
                true
            }
            SessionMessage::Command { from, command } => self.on_command(&from, command),
        }
    }

    fn welcome(&self, conn: &Connection) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let clock = self.replay.clock();
        let greeting = [
            ServerEvent::Init(telemetry.init_data(&self.id, self.config.tick_rate_hz)),
            self.status_event(),
            ServerEvent::Frame(telemetry.frame_at(clock.current_time_ms(), clock.speed())),
        ];
        for event in &greeting {
            if let Err(e) = conn.send_event(event) {
                warn!(conn_id = %conn.id, error = %e, "failed to serialize greeting");
            }
        }
    }

    fn on_command(&mut self, from: &ConnectionId, command: Command) -> bool {
        counter!(COMMANDS_TOTAL, "action" => command.action()).increment(1);
        match command {
            Command::Ping => {
                let _ = self.broadcaster.send_to(from, &ServerEvent::Pong);
            }
            Command::Stop => {
                info!(conn_id = %from, "session stopped by viewer");
                self.broadcaster.close_all(Some(&ServerEvent::Stopped));
                return false;
            }
            other => match self.replay.apply(&other) {
                Ok(()) => {
                    debug!(conn_id = %from, action = other.action(), state = self.replay.state().name(), "command applied");
                    self.publish();
                    let _ = self.broadcaster.broadcast(&self.status_event());
                }
                Err(e) => {
                    debug!(conn_id = %from, error = %e, kind = e.kind(), "command rejected");
                    let _ = self
                        .broadcaster
                        .send_to(from, &ServerEvent::error(e.to_string(), e.kind()));
                }
            },
        }
        true
    }

    fn on_tick(&mut self) {
        match self.replay.tick() {
            TickOutcome::Idle => return,
            TickOutcome::Frame { time_ms } => self.emit_frame(time_ms),
            TickOutcome::Finished { time_ms } => {
                self.emit_frame(time_ms);
                info!(time_ms, "playback finished");
                let _ = self.broadcaster.broadcast(&ServerEvent::Finished);
                let _ = self.broadcaster.broadcast(&self.status_event());
            }
        }
        self.publish();
    }

    fn emit_frame(&self, time_ms: f64) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let frame = telemetry.frame_at(time_ms, self.replay.clock().speed());
        let report = self.broadcaster.broadcast(&ServerEvent::Frame(frame));
        counter!(FRAMES_TOTAL).increment(1);
        trace!(
            time_ms,
            delivered = report.delivered,
            lagged = report.lagged,
            pruned = report.pruned,
            "frame"
        );
    }

    fn status_event(&self) -> ServerEvent {
        let clock = self.replay.clock();
        ServerEvent::Status(StatusData {
            state: self.replay.state().name().to_string(),
            is_playing: self.replay.is_playing(),
            speed: clock.speed(),
            current_time_ms: clock.current_time_ms(),
            duration_ms: self.replay.duration_ms(),
        })
    }

    fn publish(&self) {
        let _ = self.snapshot.send_replace(SessionSnapshot::of(&self.replay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        FailingSource, ReleaseCounter, SlowSource, drain_until, next_event, speed_session,
        test_config,
    };
    use std::sync::atomic::Ordering;
    use serde_json::Value;

    fn viewer(id: &SessionId, capacity: usize) -> Arc<Connection> {
        Arc::new(Connection::new(id.clone(), capacity))
    }

    #[tokio::test(start_paused = true)]
    async fn greets_new_viewer() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let conn = viewer(&id, 64);
        handle.join(Arc::clone(&conn)).await.unwrap();

        let init = next_event(&conn).await;
        assert_eq!(init["type"], "init");
        assert_eq!(init["data"]["duration_ms"], 2000.0);
        assert_eq!(init["data"]["driver_count"], 1);
        let status = next_event(&conn).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["data"]["state"], "ready");
        let frame = next_event(&conn).await;
        assert_eq!(frame["type"], "frame");
        assert_eq!(frame["data"]["timestamp_ms"], 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_speed_play_until_finished() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let conn = viewer(&id, 256);
        handle.join(Arc::clone(&conn)).await.unwrap();
        let _ = drain_until(&conn, "frame").await;

        handle.command(&conn.id, Command::Seek { time_ms: 1500.0 }).await.unwrap();
        let seek_frame = drain_until(&conn, "frame").await;
        assert_eq!(seek_frame["data"]["timestamp_ms"], 1500.0);
        assert_eq!(seek_frame["data"]["cars"][0]["speed"], 150.0);

        handle.command(&conn.id, Command::SetSpeed { speed: 2.0 }).await.unwrap();
        let started = Instant::now();
        handle.command(&conn.id, Command::Play).await.unwrap();

        let mut last = 1500.0;
        let mut finished = 0;
        loop {
            let ev = next_event(&conn).await;
            match ev["type"].as_str() {
                Some("frame") => {
                    let t = ev["data"]["timestamp_ms"].as_f64().unwrap();
                    assert!(t >= last && t <= 2000.0, "frame at {t} after {last}");
                    last = t;
                }
                Some("finished") => {
                    finished += 1;
                    break;
                }
                _ => {}
            }
        }
        assert!(started.elapsed() <= Duration::from_millis(500));
        assert_eq!(last, 2000.0);

        // Nothing else finishes while the clock sits at the end.
        time::sleep(Duration::from_secs(1)).await;
        while let Some(msg) = conn.try_next() {
            let ev: Value = serde_json::from_str(&msg).unwrap();
            if ev["type"] == "finished" {
                finished += 1;
            }
        }
        assert_eq!(finished, 1);

        let snap = handle.snapshot();
        assert_eq!(snap.state, SessionState::Finished);
        assert_eq!(snap.current_time_ms, 2000.0);
        assert_eq!(snap.speed, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_speed_only_answers_sender() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let sender = viewer(&id, 64);
        let other = viewer(&id, 64);
        handle.join(Arc::clone(&sender)).await.unwrap();
        handle.join(Arc::clone(&other)).await.unwrap();
        let _ = drain_until(&sender, "frame").await;
        let _ = drain_until(&other, "frame").await;

        handle.command(&sender.id, Command::SetSpeed { speed: 99.0 }).await.unwrap();
        let err = next_event(&sender).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["data"]["kind"], "invalid_speed");

        time::sleep(Duration::from_millis(100)).await;
        assert!(other.try_next().is_none());
        assert_eq!(handle.snapshot().speed, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn status_is_broadcast_to_every_viewer() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let a = viewer(&id, 64);
        let b = viewer(&id, 64);
        handle.join(Arc::clone(&a)).await.unwrap();
        handle.join(Arc::clone(&b)).await.unwrap();
        let _ = drain_until(&a, "frame").await;
        let _ = drain_until(&b, "frame").await;

        handle.command(&a.id, Command::SetSpeed { speed: 4.0 }).await.unwrap();
        for conn in [&a, &b] {
            let status = drain_until(conn, "status").await;
            assert_eq!(status["data"]["speed"], 4.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ping_answers_sender_only() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let a = viewer(&id, 64);
        let b = viewer(&id, 64);
        handle.join(Arc::clone(&a)).await.unwrap();
        handle.join(Arc::clone(&b)).await.unwrap();
        let _ = drain_until(&a, "frame").await;
        let _ = drain_until(&b, "frame").await;

        handle.command(&a.id, Command::Ping).await.unwrap();
        assert_eq!(next_event(&a).await["type"], "pong");
        time::sleep(Duration::from_millis(100)).await;
        assert!(b.try_next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_rejected_while_loading() {
        let (source, id) = SlowSource::new(Duration::from_secs(5));
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let conn = viewer(&id, 64);
        handle.join(Arc::clone(&conn)).await.unwrap();
        handle.command(&conn.id, Command::Play).await.unwrap();

        let err = next_event(&conn).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["data"]["kind"], "invalid_transition");
        assert_eq!(handle.snapshot().state, SessionState::Loading);

        let init = drain_until(&conn, "init").await;
        assert_eq!(init["data"]["session_id"], id.as_str());
        assert_eq!(handle.snapshot().state, SessionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn source_released_once_loaded() {
        let (source, id) = ReleaseCounter::new();
        let dyn_source: Arc<dyn TelemetrySource> = source.clone();
        let handle = SessionHandle::spawn(id.clone(), dyn_source, test_config());
        let conn = viewer(&id, 64);
        handle.join(Arc::clone(&conn)).await.unwrap();

        let _ = drain_until(&conn, "frame").await;
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
        // Playback keeps working from the loaded telemetry.
        handle.command(&conn.id, Command::Seek { time_ms: 1000.0 }).await.unwrap();
        let frame = drain_until(&conn, "frame").await;
        assert_eq!(frame["data"]["timestamp_ms"], 1000.0);
        assert_eq!(source.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn source_failure_errors_and_tears_down() {
        let id = SessionId::from_raw("broken");
        let handle = SessionHandle::spawn(id.clone(), Arc::new(FailingSource), test_config());
        let conn = viewer(&id, 64);
        // The actor may fail before or after the join is queued.
        let _ = handle.join(Arc::clone(&conn)).await;
        handle.closed().await;
        handle.wait().await;

        assert!(handle.is_closed());
        assert!(matches!(handle.snapshot().state, SessionState::Errored { .. }));
        assert!(handle.command(&conn.id, Command::Play).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn source_failure_notifies_viewers() {
        let (source, id) = SlowSource::failing(Duration::from_secs(1));
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let conn = viewer(&id, 64);
        handle.join(Arc::clone(&conn)).await.unwrap();

        let err = next_event(&conn).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["data"]["kind"], "telemetry_unavailable");
        assert!(conn.next_outbound().await.is_none());
        assert!(conn.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_tears_down_for_everyone() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let a = viewer(&id, 64);
        let b = viewer(&id, 64);
        handle.join(Arc::clone(&a)).await.unwrap();
        handle.join(Arc::clone(&b)).await.unwrap();
        handle.command(&a.id, Command::Play).await.unwrap();
        handle.command(&b.id, Command::Stop).await.unwrap();

        for conn in [&a, &b] {
            let stopped = drain_until(conn, "stopped").await;
            assert_eq!(stopped["type"], "stopped");
            assert!(conn.next_outbound().await.is_none());
        }
        handle.wait().await;
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_tick_loop() {
        let (source, id) = speed_session();
        let handle = SessionHandle::spawn(id.clone(), source, test_config());
        let conn = viewer(&id, 64);
        handle.join(Arc::clone(&conn)).await.unwrap();
        handle.command(&conn.id, Command::Play).await.unwrap();
        time::sleep(Duration::from_millis(100)).await;

        handle.shutdown();
        handle.wait().await;
        let before = handle.snapshot().current_time_ms;
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.snapshot().current_time_ms, before);
        while conn.try_next().is_some() {}
        assert!(conn.next_outbound().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_viewer_does_not_hold_back_others() {
        let (source, id) = speed_session();
        let config = SessionConfig {
            max_consecutive_overflows: 4,
            ..test_config()
        };
        let handle = SessionHandle::spawn(id.clone(), source, config);
        let stalled = viewer(&id, 2);
        let healthy = viewer(&id, 64);
        handle.join(Arc::clone(&stalled)).await.unwrap();
        handle.join(Arc::clone(&healthy)).await.unwrap();
        let _ = drain_until(&healthy, "frame").await;
        handle.command(&healthy.id, Command::Play).await.unwrap();

        let mut last = -1.0;
        let mut frames = 0;
        loop {
            let ev = next_event(&healthy).await;
            if ev["type"] == "frame" {
                let t = ev["data"]["timestamp_ms"].as_f64().unwrap();
                assert!(t > last, "timestamps must increase: {t} after {last}");
                last = t;
                frames += 1;
            }
            if ev["type"] == "finished" {
                break;
            }
        }
        // 2000ms at ~33ms per tick.
        assert!(frames >= 55, "healthy viewer saw only {frames} frames");
        assert!(stalled.is_closed());
        assert_eq!(handle.viewer_count(), 1);
    }

    #[test]
    fn config_from_settings() {
        let settings = ReplaySettings {
            tick_rate_hz: 10,
            max_speed: 4.0,
            ..ReplaySettings::default()
        };
        let config = SessionConfig::from_settings(&settings);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert_eq!(config.limits.max, 4.0);
        assert_eq!(config.tick_rate_hz, 10);
    }
}
