//! WebSocket session lifecycle: one viewer socket from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use pitwall_core::{Command, ServerEvent};
use pitwall_replay::{Connection, ReplayError, SessionHandle, SessionRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::handler::{decode_binary, decode_text, error_event};
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_HEARTBEAT_TIMEOUTS_TOTAL, WS_PROTOCOL_ERRORS_TOTAL,
};

/// How long queued output may take to flush once the socket is closing.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-socket timing.
#[derive(Clone, Copy, Debug)]
pub struct SocketTimings {
    /// Interval between server Ping frames and liveness checks.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before the socket is dropped.
    pub heartbeat_timeout: Duration,
}

/// Run a viewer socket attached to `connection.session_id`.
///
/// 1. Subscribes the connection; the session greets it with `init`,
///    `status` and the current frame
/// 2. Forwards the connection's outbound queue to the socket and sends
///    periodic Ping frames
/// 3. Decodes inbound frames as commands for the session actor
/// 4. Unsubscribes on close, heartbeat timeout, session teardown or
///    server shutdown
#[instrument(skip_all, fields(session_id = %connection.session_id, conn_id = %connection.id))]
pub async fn run_ws_session(
    mut ws: WebSocket,
    connection: Arc<Connection>,
    registry: Arc<SessionRegistry>,
    timings: SocketTimings,
    shutdown: CancellationToken,
) {
    let handle = match registry.subscribe(Arc::clone(&connection)).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "subscribe failed");
            if let Ok(json) = error_event(&e).to_json() {
                let _ = ws.send(Message::Text(json.into())).await;
            }
            let _ = ws.send(Message::Close(None)).await;
            return;
        }
    };

    info!("viewer connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Fires once the writer stops, whatever the reason.
    let outbound_done = CancellationToken::new();

    let writer_conn = Arc::clone(&connection);
    let writer_guard = outbound_done.clone();
    let ping_every = timings.heartbeat_interval;
    let mut writer = tokio::spawn(async move {
        let _guard = writer_guard.drop_guard();
        let mut ping_interval = tokio::time::interval(ping_every);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = writer_conn.next_outbound() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.to_string().into())).await.is_err() {
                                return;
                            }
                        }
                        // Closed and drained.
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                        return;
                    }
                }
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let heartbeat_cancel = shutdown.child_token();
    let heartbeat = run_heartbeat(
        Arc::clone(&connection),
        timings.heartbeat_interval,
        timings.heartbeat_timeout,
        heartbeat_cancel.clone(),
    );
    tokio::pin!(heartbeat);

    let reason = loop {
        tokio::select! {
            () = shutdown.cancelled() => break "server shutdown",
            () = outbound_done.cancelled() => break "outbound closed",
            result = &mut heartbeat => {
                if result == HeartbeatResult::TimedOut {
                    warn!(
                        timeout_ms = u64::try_from(timings.heartbeat_timeout.as_millis()).unwrap_or(u64::MAX),
                        "viewer unresponsive, disconnecting"
                    );
                    counter!(WS_HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                    break "heartbeat timeout";
                }
                break "heartbeat cancelled";
            }
            msg = ws_rx.next() => {
                let decoded = match msg {
                    Some(Ok(Message::Text(text))) => decode_text(text.as_str()),
                    Some(Ok(Message::Binary(data))) => decode_binary(&data),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        connection.mark_alive();
                        continue;
                    }
                    Some(Ok(Message::Close(_))) => break "client closed",
                    Some(Err(e)) => {
                        debug!(error = %e, "socket read failed");
                        break "transport error";
                    }
                    None => break "client closed",
                };
                connection.mark_alive();
                dispatch(&connection, &handle, decoded).await;
            }
        }
    };

    heartbeat_cancel.cancel();
    registry.unsubscribe(&connection.session_id, &connection.id);
    connection.close();
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    info!(
        reason,
        dropped = connection.dropped_count(),
        "viewer disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Hand a decoded command to the session; errors go back to this viewer only.
async fn dispatch(
    connection: &Connection,
    handle: &SessionHandle,
    decoded: Result<Command, ReplayError>,
) {
    let result = match decoded {
        Ok(command) => handle.command(&connection.id, command).await,
        Err(e) => {
            counter!(WS_PROTOCOL_ERRORS_TOTAL).increment(1);
            Err(e)
        }
    };
    if let Err(e) = result {
        reply(connection, &error_event(&e));
    }
}

fn reply(connection: &Connection, event: &ServerEvent) {
    if let Err(e) = connection.send_event(event) {
        warn!(error = %e, event = event.type_name(), "failed to encode reply");
    }
}
