//! Bounded per-viewer outbound queue with drop-oldest overflow.
//!
//! Producers never wait: a push into a full queue evicts the oldest entry.
//! A single consumer (the socket writer) awaits [`OutboundQueue::pop`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Result of [`OutboundQueue::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Enqueued without eviction.
    Queued,
    /// Enqueued after evicting the oldest entry.
    DroppedOldest,
    /// The queue is closed; nothing was enqueued.
    Closed,
}

struct Inner {
    items: VecDeque<Arc<str>>,
    closed: bool,
}

/// Bounded FIFO of serialized messages.
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    /// Queue holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue without blocking.
    pub fn push(&self, message: Arc<str>) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }
            let outcome = if inner.items.len() >= self.capacity {
                let _ = inner.items.pop_front();
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            inner.items.push_back(message);
            outcome
        };
        self.notify.notify_one();
        outcome
    }

    /// Next message. After [`close`](Self::close), remaining messages are
    /// still returned, then `None`.
    pub async fn pop(&self) -> Option<Arc<str>> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(message) = inner.items.pop_front() {
                    return Some(message);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking variant of [`pop`](Self::pop).
    pub fn try_pop(&self) -> Option<Arc<str>> {
        self.inner.lock().items.pop_front()
    }

    /// Stop accepting messages and wake the consumer.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_one();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Messages currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum buffered messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn msg(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn fifo_order() {
        let q = OutboundQueue::new(4);
        assert_eq!(q.push(msg("a")), PushOutcome::Queued);
        assert_eq!(q.push(msg("b")), PushOutcome::Queued);
        assert_eq!(q.try_pop().as_deref(), Some("a"));
        assert_eq!(q.try_pop().as_deref(), Some("b"));
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = OutboundQueue::new(2);
        let _ = q.push(msg("1"));
        let _ = q.push(msg("2"));
        assert_eq!(q.push(msg("3")), PushOutcome::DroppedOldest);
        assert_eq!(q.len(), 2);
        assert_eq!(q.try_pop().as_deref(), Some("2"));
        assert_eq!(q.try_pop().as_deref(), Some("3"));
    }

    #[test]
    fn zero_capacity_becomes_one() {
        let q = OutboundQueue::new(0);
        assert_eq!(q.capacity(), 1);
        assert_eq!(q.push(msg("a")), PushOutcome::Queued);
        assert_eq!(q.push(msg("b")), PushOutcome::DroppedOldest);
    }

    #[test]
    fn closed_rejects_push() {
        let q = OutboundQueue::new(2);
        q.close();
        assert!(q.is_closed());
        assert_eq!(q.push(msg("a")), PushOutcome::Closed);
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn pop_drains_then_ends_after_close() {
        let q = OutboundQueue::new(4);
        let _ = q.push(msg("x"));
        let _ = q.push(msg("y"));
        q.close();
        assert_eq!(q.pop().await.as_deref(), Some("x"));
        assert_eq!(q.pop().await.as_deref(), Some("y"));
        assert!(q.pop().await.is_none());
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let q = Arc::new(OutboundQueue::new(4));
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _ = q.push(msg("late"));
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn close_wakes_waiting_consumer() {
        let q = Arc::new(OutboundQueue::new(4));
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        q.close();
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert!(got.is_none());
    }
}
