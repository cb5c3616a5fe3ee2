//! Per-session fan-out of events to viewer queues.
//!
//! An event is serialized once and pushed onto every connection's bounded
//! queue. Pushing never waits on socket I/O, so one slow viewer cannot
//! delay the tick loop or its siblings. A viewer whose queue overflows on
//! too many consecutive sends is pruned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::{Mutex, RwLock};
use pitwall_core::{ConnectionId, ServerEvent, SessionId};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::connection::{Connection, SendOutcome};
use crate::errors::ReplayError;
use crate::metrics::{CONNECTIONS_PRUNED_TOTAL, FRAMES_DROPPED_TOTAL};

/// Counts from one [`Broadcaster::broadcast`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that took the event without eviction.
    pub delivered: usize,
    /// Connections that evicted an older message to take it.
    pub lagged: usize,
    /// Connections removed during this call.
    pub pruned: usize,
}

/// Live subscribers of one session.
pub struct Broadcaster {
    session_id: SessionId,
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    /// Viewers that left before their join was applied.
    departed: Mutex<HashSet<ConnectionId>>,
    max_consecutive_overflows: u32,
    empty_since: Mutex<Option<Instant>>,
}

impl Broadcaster {
    /// Empty broadcaster. The idle timer starts immediately.
    pub fn new(session_id: SessionId, max_consecutive_overflows: u32) -> Self {
        Self {
            session_id,
            connections: RwLock::new(HashMap::new()),
            departed: Mutex::new(HashSet::new()),
            max_consecutive_overflows: max_consecutive_overflows.max(1),
            empty_since: Mutex::new(Some(Instant::now())),
        }
    }

    /// Add a subscriber. A connection that is closed, or that already
    /// [`left`](Self::leave), is refused and closed; returns whether it was
    /// added.
    pub fn add(&self, connection: Arc<Connection>) -> bool {
        let mut conns = self.connections.write();
        let departed = self.departed.lock().remove(&connection.id);
        if departed || connection.is_closed() {
            connection.close();
            self.start_idle_timer(&conns);
            return false;
        }
        let _ = conns.insert(connection.id.clone(), connection);
        *self.empty_since.lock() = None;
        true
    }

    /// Remove a subscriber. Does not close its queue.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut conns = self.connections.write();
        let removed = conns.remove(connection_id);
        self.start_idle_timer(&conns);
        removed
    }

    /// Remove a subscriber on its own request. If it has not been added yet
    /// the id is remembered and the pending [`add`](Self::add) is refused.
    pub fn leave(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut conns = self.connections.write();
        let removed = conns.remove(connection_id);
        if removed.is_none() {
            let _ = self.departed.lock().insert(connection_id.clone());
        }
        self.start_idle_timer(&conns);
        removed
    }

    fn start_idle_timer(&self, conns: &HashMap<ConnectionId, Arc<Connection>>) {
        if conns.is_empty() {
            let mut empty_since = self.empty_since.lock();
            if empty_since.is_none() {
                *empty_since = Some(Instant::now());
            }
        }
    }

    /// Stop the idle timer until the next removal empties the set again.
    pub fn mark_active(&self) {
        *self.empty_since.lock() = None;
    }

    /// How long the session has had no subscribers, if it has none.
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        if !self.connections.read().is_empty() {
            return None;
        }
        self.empty_since
            .lock()
            .map(|since| now.saturating_duration_since(since))
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Send an event to every subscriber.
    pub fn broadcast(&self, event: &ServerEvent) -> BroadcastReport {
        let Some(json) = encode(event) else {
            return BroadcastReport::default();
        };

        let mut report = BroadcastReport::default();
        let mut to_prune = Vec::new();
        {
            let conns = self.connections.read();
            for conn in conns.values() {
                match conn.send(Arc::clone(&json)) {
                    SendOutcome::Delivered => report.delivered += 1,
                    SendOutcome::Lagged { consecutive } => {
                        report.lagged += 1;
                        counter!(FRAMES_DROPPED_TOTAL).increment(1);
                        if consecutive >= self.max_consecutive_overflows {
                            to_prune.push((Arc::clone(conn), Some(consecutive)));
                        }
                    }
                    SendOutcome::Closed => to_prune.push((Arc::clone(conn), None)),
                }
            }
        }

        for (conn, overflows) in to_prune {
            let _ = self.remove(&conn.id);
            if let Some(consecutive) = overflows {
                let err = ReplayError::BackpressureOverflow(consecutive);
                warn!(
                    session_id = %self.session_id,
                    conn_id = %conn.id,
                    dropped = conn.dropped_count(),
                    "pruning slow viewer"
                );
                let _ = conn.send_event(&ServerEvent::error(err.to_string(), err.kind()));
            } else {
                debug!(session_id = %self.session_id, conn_id = %conn.id, "pruning closed viewer");
            }
            conn.close();
            counter!(CONNECTIONS_PRUNED_TOTAL).increment(1);
            report.pruned += 1;
        }
        report
    }

    /// Send an event to one subscriber. Returns `false` if it is not
    /// subscribed or its queue is closed.
    pub fn send_to(&self, connection_id: &ConnectionId, event: &ServerEvent) -> bool {
        let conn = self.connections.read().get(connection_id).cloned();
        match conn {
            Some(conn) => matches!(
                conn.send_event(event),
                Ok(SendOutcome::Delivered | SendOutcome::Lagged { .. })
            ),
            None => false,
        }
    }

    /// Optionally send a last event, then close and drop every subscriber.
    pub fn close_all(&self, final_event: Option<&ServerEvent>) {
        let drained: Vec<Arc<Connection>> = {
            let mut conns = self.connections.write();
            self.departed.lock().clear();
            conns.drain().map(|(_, c)| c).collect()
        };
        let json = final_event.and_then(encode);
        for conn in &drained {
            if let Some(json) = &json {
                let _ = conn.send(Arc::clone(json));
            }
            conn.close();
        }
        let mut empty_since = self.empty_since.lock();
        if empty_since.is_none() {
            *empty_since = Some(Instant::now());
        }
        debug!(session_id = %self.session_id, closed = drained.len(), "closed all viewers");
    }
}

fn encode(event: &ServerEvent) -> Option<Arc<str>> {
    match event.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(event_type = event.type_name(), error = %e, "failed to serialize event");
            None
        }
    }
}
