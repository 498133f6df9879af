//! In-memory publish/subscribe broker for progress events
//!
//! # Overflow policy
//!
//! Each subscriber owns a bounded mailbox. Publishing never waits: when a
//! mailbox is full the new event is dropped for that subscriber only
//! (drop-newest) and the subscriber's drop counter is incremented. Events
//! already in the mailbox keep their FIFO order. Nothing is guaranteed about
//! ordering across different subscribers.

use super::ProgressEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Request id under which global subscribers register
pub const GLOBAL: &str = "";

struct Subscriber {
    tx: mpsc::Sender<ProgressEvent>,
    dropped: Arc<AtomicU64>,
}

struct HubInner {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<String, HashMap<u64, Subscriber>>>,
}

/// Fans progress events out to global and per-request subscribers
///
/// Cloning the hub is cheap; all clones share one registry.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    /// Creates a hub whose subscribers each buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Registers a subscriber for `request_id`, or for every event when
    /// `request_id` is [`GLOBAL`]
    pub fn subscribe(&self, request_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut subscribers = self
                .inner
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.entry(request_id.to_string()).or_default().insert(
                id,
                Subscriber {
                    tx,
                    dropped: dropped.clone(),
                },
            );
        }

        tracing::debug!(subscriber = id, request_id, "Subscriber registered");

        Subscription {
            id,
            request_id: request_id.to_string(),
            rx,
            dropped,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `event` to global subscribers and to those registered under
    /// its request id, without blocking
    pub fn publish(&self, event: ProgressEvent) {
        let subscribers = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut keys = vec![GLOBAL];
        if event.request_id != GLOBAL {
            keys.push(event.request_id.as_str());
        }

        for key in keys {
            let Some(group) = subscribers.get(key) else {
                continue;
            };
            for (id, subscriber) in group {
                match subscriber.tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(subscriber = id, "Mailbox full, event dropped");
                    }
                    // Receiver is being torn down; removal happens in Drop
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }
    }

    /// Number of live subscribers registered under `request_id`
    pub fn subscriber_count(&self, request_id: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_id)
            .map_or(0, HashMap::len)
    }

    /// Removes a subscription and closes its mailbox
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }
}

impl HubInner {
    fn remove(&self, request_id: &str, id: u64) {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(group) = subscribers.get_mut(request_id) {
            group.remove(&id);
            if group.is_empty() {
                subscribers.remove(request_id);
            }
        }
    }
}

/// Receiving half of a hub registration
///
/// Dropping the subscription unregisters it.
pub struct Subscription {
    id: u64,
    request_id: String,
    rx: mpsc::Receiver<ProgressEvent>,
    dropped: Arc<AtomicU64>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Waits for the next event; `None` once the hub is gone
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Returns a buffered event without waiting
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Drains every event currently buffered
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Request id this subscription was registered under
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Events discarded because the mailbox was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.request_id, self.id);
            tracing::debug!(subscriber = self.id, "Subscriber removed");
        }
    }
}
