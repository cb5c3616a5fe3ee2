//! Viewer connection state shared between the socket and the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pitwall_core::{ConnectionId, ServerEvent, SessionId};
use tokio::time::Instant;

use crate::queue::{OutboundQueue, PushOutcome};

/// Result of [`Connection::send`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued; the overflow streak is reset.
    Delivered,
    /// Queued after evicting an older message.
    Lagged {
        /// Overflows in a row, including this one.
        consecutive: u32,
    },
    /// The connection is closed.
    Closed,
}

/// One viewer subscribed to one session.
pub struct Connection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Session this viewer watches.
    pub session_id: SessionId,
    queue: OutboundQueue,
    /// When this connection was established.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_heartbeat: Mutex<Instant>,
    consecutive_overflows: AtomicU32,
    dropped_messages: AtomicU64,
}

impl Connection {
    /// New connection with an outbound queue of `capacity` messages.
    pub fn new(session_id: SessionId, capacity: usize) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            session_id,
            queue: OutboundQueue::new(capacity),
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_heartbeat: Mutex::new(now),
            consecutive_overflows: AtomicU32::new(0),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a serialized message without blocking.
    pub fn send(&self, message: Arc<str>) -> SendOutcome {
        match self.queue.push(message) {
            PushOutcome::Queued => {
                self.consecutive_overflows.store(0, Ordering::Relaxed);
                SendOutcome::Delivered
            }
            PushOutcome::DroppedOldest => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                let consecutive = self.consecutive_overflows.fetch_add(1, Ordering::Relaxed) + 1;
                SendOutcome::Lagged { consecutive }
            }
            PushOutcome::Closed => SendOutcome::Closed,
        }
    }

    /// Serialize an event and enqueue it.
    pub fn send_event(&self, event: &ServerEvent) -> Result<SendOutcome, serde_json::Error> {
        let json = event.to_json()?;
        Ok(self.send(Arc::from(json)))
    }

    /// Next outbound message for the socket writer; `None` once closed and
    /// drained.
    pub async fn next_outbound(&self) -> Option<Arc<str>> {
        self.queue.pop().await
    }

    /// Stop accepting messages. Already queued ones are still delivered.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Whether the connection was closed.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Messages waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Messages evicted because the viewer fell behind.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Current overflow streak.
    pub fn consecutive_overflows(&self) -> u32 {
        self.consecutive_overflows.load(Ordering::Relaxed)
    }

    /// Record viewer activity (pong or any inbound message).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_heartbeat.lock() = Instant::now();
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last recorded activity.
    pub fn last_heartbeat_elapsed(&self) -> Duration {
        self.last_heartbeat.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Non-blocking pop, for inspecting queued output in tests.
    #[cfg(test)]
    pub(crate) fn try_next(&self) -> Option<Arc<str>> {
        self.queue.try_pop()
    }
}
