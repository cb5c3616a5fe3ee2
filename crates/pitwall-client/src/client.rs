//! Tokio driver for the reconnection machine.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pitwall_core::{Command, ServerEvent};
use pitwall_settings::ClientSettings;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::backoff::ReconnectPolicy;
use crate::errors::ClientError;
use crate::heartbeat::{HeartbeatAction, HeartbeatMonitor};
use crate::machine::{Effect, ReconnectEvent, ReconnectMachine, ReconnectState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client tuning.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Reconnect backoff.
    pub policy: ReconnectPolicy,
    /// Interval between `ping` commands.
    pub heartbeat_interval: Duration,
    /// Unanswered pings that force a reconnect.
    pub max_missed_heartbeats: u32,
    /// Buffered commands and events in each direction.
    pub channel_capacity: usize,
}

impl ClientOptions {
    /// Options from the `client` settings section.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            policy: ReconnectPolicy::from_settings(settings),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms.max(1)),
            max_missed_heartbeats: settings.max_missed_heartbeats,
            channel_capacity: 256,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_settings(&ClientSettings::default())
    }
}

/// What the caller observes.
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// An event from the server.
    Server(ServerEvent),
    /// The socket dropped.
    Disconnected {
        /// Why, for display.
        reason: String,
    },
    /// A reconnect attempt is scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Wait before dialing.
        delay: Duration,
    },
    /// A reconnect attempt succeeded.
    Reconnected {
        /// Attempt that succeeded.
        attempt: u32,
    },
    /// Reconnection was abandoned. No further events follow.
    GaveUp {
        /// Attempts made.
        attempts: u32,
    },
    /// The session ended on the server (`stopped`). No reconnect is tried.
    SessionEnded,
}

/// A connected replay viewer.
pub struct ReplayClient {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ReconnectState>,
    cancel: CancellationToken,
    frames_dropped: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl ReplayClient {
    /// Connect to `url`.
    ///
    /// A failed first handshake is returned as [`ClientError::Connect`];
    /// automatic reconnection only covers connections that were once open.
    ///
    /// The socket is serviced whether or not the caller drains the event
    /// receiver. While the receiver is full, `frame` events are dropped
    /// (see [`frames_dropped`](Self::frames_dropped)) and every other
    /// server event is held back in order until there is room. Heartbeats
    /// and commands keep flowing in the meantime.
    pub async fn connect(
        url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), ClientError> {
        let url = url.into();
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        info!(%url, "connected");

        let capacity = options.channel_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (state_tx, state_rx) = watch::channel(ReconnectState::Connected);
        let cancel = CancellationToken::new();
        let frames_dropped = Arc::new(AtomicU64::new(0));

        let driver = Driver {
            url,
            machine: ReconnectMachine::connected(options.policy.clone()),
            options,
            commands: command_rx,
            events: event_tx,
            state: state_tx,
            cancel: cancel.clone(),
            frames_dropped: Arc::clone(&frames_dropped),
        };
        let task = tokio::spawn(driver.run(stream));

        Ok((
            Self {
                commands: command_tx,
                state: state_rx,
                cancel,
                frames_dropped,
                task,
            },
            event_rx,
        ))
    }

    /// Queue a command. Commands sent while reconnecting are delivered once
    /// the socket is back.
    pub async fn send(&self, command: Command) -> Result<(), ClientError> {
        if self.state.borrow().is_terminal() {
            return Err(ClientError::GaveUp(self.given_up_attempts()));
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Start or resume playback.
    pub async fn play(&self) -> Result<(), ClientError> {
        self.send(Command::Play).await
    }

    /// Pause playback.
    pub async fn pause(&self) -> Result<(), ClientError> {
        self.send(Command::Pause).await
    }

    /// Move the shared clock.
    pub async fn seek(&self, time_ms: f64) -> Result<(), ClientError> {
        self.send(Command::Seek { time_ms }).await
    }

    /// Change the replay speed.
    pub async fn set_speed(&self, speed: f64) -> Result<(), ClientError> {
        self.send(Command::SetSpeed { speed }).await
    }

    /// Frames discarded because the event receiver was full.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Current connection state.
    pub fn state(&self) -> ReconnectState {
        self.state.borrow().clone()
    }

    /// Close the socket and stop reconnecting.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "client task failed");
        }
    }

    fn given_up_attempts(&self) -> u32 {
        match &*self.state.borrow() {
            ReconnectState::GivenUp { attempts } => *attempts,
            _ => 0,
        }
    }
}

/// How an open link ended.
enum LinkEnd {
    Closed(String),
    HeartbeatTimedOut,
    SessionEnded,
    Cancelled,
}

struct Driver {
    url: String,
    machine: ReconnectMachine,
    options: ClientOptions,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<ClientEvent>,
    state: watch::Sender<ReconnectState>,
    cancel: CancellationToken,
    frames_dropped: Arc<AtomicU64>,
}

impl Driver {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn run(mut self, stream: WsStream) {
        let mut link = Some(stream);
        let mut effect = None;

        loop {
            if let Some(stream) = link.take() {
                let event = match self.pump(stream).await {
                    LinkEnd::Cancelled => break,
                    LinkEnd::SessionEnded => {
                        self.emit(ClientEvent::SessionEnded).await;
                        break;
                    }
                    LinkEnd::Closed(reason) => {
                        info!(%reason, "disconnected");
                        self.emit(ClientEvent::Disconnected { reason }).await;
                        ReconnectEvent::TransportClosed
                    }
                    LinkEnd::HeartbeatTimedOut => {
                        warn!(
                            missed = self.options.max_missed_heartbeats,
                            "heartbeat timed out"
                        );
                        self.emit(ClientEvent::Disconnected {
                            reason: "heartbeat timeout".into(),
                        })
                        .await;
                        ReconnectEvent::HeartbeatTimedOut
                    }
                };
                effect = self.step(event);
            }

            match effect.take() {
                Some(Effect::ScheduleReconnect { attempt, delay }) => {
                    debug!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "reconnect scheduled"
                    );
                    self.emit(ClientEvent::Reconnecting { attempt, delay }).await;
                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    effect = self.step(ReconnectEvent::RetryTimerFired);
                }
                Some(Effect::Dial { attempt }) => {
                    let cancel = self.cancel.clone();
                    let dialed = tokio::select! {
                        () = cancel.cancelled() => break,
                        result = connect_async(self.url.as_str()) => result,
                    };
                    match dialed {
                        Ok((stream, _)) => {
                            info!(attempt, "reconnected");
                            link = Some(stream);
                            effect = self.step(ReconnectEvent::DialSucceeded);
                            self.emit(ClientEvent::Reconnected { attempt }).await;
                        }
                        Err(e) => {
                            warn!(attempt, error = %e, "reconnect failed");
                            effect = self.step(ReconnectEvent::DialFailed);
                        }
                    }
                }
                Some(Effect::GiveUp { attempts }) => {
                    warn!(attempts, "giving up on reconnect");
                    self.emit(ClientEvent::GaveUp { attempts }).await;
                    break;
                }
                None => {
                    if link.is_none() {
                        break;
                    }
                }
            }
        }
        debug!(state = self.machine.state().name(), "client driver stopped");
    }

    fn step(&mut self, event: ReconnectEvent) -> Option<Effect> {
        let effect = self.machine.handle(event);
        let _ = self.state.send_replace(self.machine.state().clone());
        effect
    }

    async fn emit(&self, event: ClientEvent) {
        // The caller may have dropped the receiver; keep driving regardless.
        let _ = self.events.send(event).await;
    }

    /// Hand a server event to the caller without waiting for room.
    fn deliver(&self, event: ServerEvent, backlog: &mut VecDeque<ClientEvent>) {
        let is_frame = matches!(event, ServerEvent::Frame(_));
        let event = ClientEvent::Server(event);
        if !backlog.is_empty() {
            if is_frame {
                self.drop_frame();
            } else {
                backlog.push_back(event);
            }
            return;
        }
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) if is_frame => self.drop_frame(),
            Err(TrySendError::Full(event)) => backlog.push_back(event),
        }
    }

    fn drop_frame(&self) {
        let dropped = self.frames_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(dropped, "event receiver full, frame dropped");
    }

    /// Shuttle commands out and events in until the link ends.
    async fn pump(&mut self, stream: WsStream) -> LinkEnd {
        let (mut sink, mut source) = stream.split();
        let mut monitor = HeartbeatMonitor::new(self.options.max_missed_heartbeats);
        let mut ticker = tokio::time::interval(self.options.heartbeat_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;
        let cancel = self.cancel.clone();
        let mut backlog = VecDeque::new();

        let end = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return LinkEnd::Cancelled;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        // Every handle is gone.
                        let _ = sink.send(Message::Close(None)).await;
                        return LinkEnd::Cancelled;
                    };
                    if let Err(reason) = send_command(&mut sink, &command).await {
                        break LinkEnd::Closed(reason);
                    }
                }
                permit = self.events.reserve(), if !backlog.is_empty() => {
                    match permit {
                        Ok(permit) => {
                            if let Some(event) = backlog.pop_front() {
                                permit.send(event);
                            }
                        }
                        Err(_) => backlog.clear(),
                    }
                }
                _ = ticker.tick() => {
                    match monitor.on_tick() {
                        HeartbeatAction::SendPing => {
                            if let Err(reason) = send_command(&mut sink, &Command::Ping).await {
                                break LinkEnd::Closed(reason);
                            }
                        }
                        HeartbeatAction::TimedOut => break LinkEnd::HeartbeatTimedOut,
                    }
                }
                msg = source.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(text.as_str()) {
                                Ok(ServerEvent::Pong) => monitor.on_ack(),
                                Ok(ServerEvent::Stopped) => {
                                    backlog.push_back(ClientEvent::Server(ServerEvent::Stopped));
                                    break LinkEnd::SessionEnded;
                                }
                                Ok(event) => self.deliver(event, &mut backlog),
                                Err(e) => warn!(error = %e, "unrecognised server message"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            break LinkEnd::Closed("server closed the connection".into());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break LinkEnd::Closed(e.to_string()),
                    }
                }
            }
        };

        // The link is gone; held-back events precede the disconnect notice.
        for event in backlog {
            self.emit(event).await;
        }
        end
    }
}

async fn send_command<S>(sink: &mut S, command: &Command) -> Result<(), String>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(command).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}
