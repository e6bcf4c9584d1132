//! Broadcast relay for out-of-band notifications
//!
//! Producers (e.g. the upload endpoint) publish messages; each live session
//! holds one `Subscription` for its lifetime. Every subscriber has its own
//! bounded queue. A full queue drops the message for that subscriber only,
//! and a message published with no subscribers is discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

/// Default per-subscriber queue depth
pub const DEFAULT_CAPACITY: usize = 32;

/// Free text plus the filenames it concerns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    pub text: String,
    pub filenames: Vec<String>,
}

impl BroadcastMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filenames: Vec::new(),
        }
    }

    pub fn with_files(text: impl Into<String>, filenames: Vec<String>) -> Self {
        Self {
            text: text.into(),
            filenames,
        }
    }
}

impl fmt::Display for BroadcastMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filenames.is_empty() {
            f.write_str(&self.text)
        } else {
            write!(f, "[{}] {}", self.filenames.join(", "), self.text)
        }
    }
}

struct RelayInner {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<BroadcastMessage>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl RelayInner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<BroadcastMessage>>> {
        // The map stays consistent even if a holder panicked
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared registry of subscribers
#[derive(Clone)]
pub struct BroadcastRelay {
    inner: Arc<RelayInner>,
}

impl BroadcastRelay {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a subscriber; it is removed when the `Subscription` drops
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers().insert(id, tx);
        tracing::debug!(subscriber_id = id, "Broadcast subscriber added");
        Subscription {
            id,
            rx,
            relay: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver to every current subscriber; returns how many accepted it
    pub fn publish(&self, message: BroadcastMessage) -> usize {
        let mut subscribers = self.inner.subscribers();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in subscribers.iter() {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = id, "Broadcast queue full, dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            subscribers.remove(&id);
        }

        if delivered == 0 {
            tracing::debug!(text = %message.text, "Broadcast published with no listening subscriber");
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }
}

impl Default for BroadcastRelay {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A session's feed of broadcast messages
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<BroadcastMessage>,
    relay: Weak<RelayInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next message; `None` once the relay is gone
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(relay) = self.relay.upgrade() {
            relay.subscribers().remove(&self.id);
            tracing::debug!(subscriber_id = self.id, "Broadcast subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let relay = BroadcastRelay::new(4);
        assert_eq!(relay.publish(BroadcastMessage::new("lost")), 0);

        // A later subscriber does not see earlier messages
        let mut sub = relay.subscribe();
        relay.publish(BroadcastMessage::new("seen"));
        assert_eq!(sub.recv().await.unwrap().text, "seen");
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_one_copy() {
        let relay = BroadcastRelay::new(4);
        let mut a = relay.subscribe();
        let mut b = relay.subscribe();

        assert_eq!(relay.publish(BroadcastMessage::new("hello")), 2);
        assert_eq!(a.recv().await.unwrap().text, "hello");
        assert_eq!(b.recv().await.unwrap().text, "hello");
        assert!(a.rx.try_recv().is_err());
        assert!(b.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fifo_per_publisher() {
        let relay = BroadcastRelay::new(8);
        let mut sub = relay.subscribe();
        for i in 0..5 {
            relay.publish(BroadcastMessage::new(format!("m{i}")));
        }
        for i in 0..5 {
            assert_eq!(sub.recv().await.unwrap().text, format!("m{i}"));
        }
    }

    #[test]
    fn test_drop_unsubscribes() {
        let relay = BroadcastRelay::new(4);
        let sub = relay.subscribe();
        let other = relay.subscribe();
        assert_ne!(sub.id(), other.id());
        assert_eq!(relay.subscriber_count(), 2);

        drop(sub);
        assert_eq!(relay.subscriber_count(), 1);
        drop(other);
        assert_eq!(relay.publish(BroadcastMessage::new("x")), 0);
    }

    #[test]
    fn test_full_queue_drops_for_that_subscriber_only() {
        let relay = BroadcastRelay::new(1);
        let _slow = relay.subscribe();
        assert_eq!(relay.publish(BroadcastMessage::new("first")), 1);
        assert_eq!(relay.publish(BroadcastMessage::new("second")), 0);

        let _fresh = relay.subscribe();
        assert_eq!(relay.publish(BroadcastMessage::new("third")), 1);
    }

    #[test]
    fn test_render_with_filenames() {
        let msg = BroadcastMessage::with_files("uploaded successfully", vec!["cat.jpg-1".to_string()]);
        assert_eq!(msg.to_string(), "[cat.jpg-1] uploaded successfully");
        assert_eq!(BroadcastMessage::new("plain").to_string(), "plain");
    }
}
