//! Broadcast hub: fans every event out to all connected subscribers.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: a
//! subscriber whose queue is full misses the message, a subscriber whose
//! receiver is gone is pruned. No replay, no backlog for late joiners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::types::{RelayEnvelope, RelayEvent};

/// Default per-subscriber queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Receiving side handed to one WebSocket connection.
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<Arc<str>>,
}

/// Subscriber registry and fan-out.
pub struct BroadcastRelay {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Arc<str>>>>,
    queue_capacity: usize,
}

impl BroadcastRelay {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();
        self.lock().insert(id, tx);
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Serialise and deliver an event. Returns the number of subscribers
    /// that accepted it.
    pub fn publish(&self, event: RelayEvent) -> usize {
        let kind = event.kind();
        match event.into_envelope() {
            Ok(envelope) => self.publish_envelope(&envelope),
            Err(e) => {
                warn!(event_type = %kind, error = %e, "Failed to serialize relay event");
                0
            }
        }
    }

    /// Deliver an already-built envelope (used for inbound rebroadcast).
    pub fn publish_envelope(&self, envelope: &RelayEnvelope) -> usize {
        match serde_json::to_string(envelope) {
            Ok(json) => {
                let mut subs = self.lock();
                Self::fan_out(&mut subs, Arc::from(json))
            }
            Err(e) => {
                warn!(event_type = %envelope.kind, error = %e, "Failed to serialize envelope");
                0
            }
        }
    }

    /// Like [`publish`](Self::publish) but gives up instead of waiting
    /// when the registry is busy. Returns `None` in that case. Safe to
    /// call from inside a tracing layer.
    pub fn try_publish(&self, event: RelayEvent) -> Option<usize> {
        let envelope = event.into_envelope().ok()?;
        let json = serde_json::to_string(&envelope).ok()?;
        let mut subs = match self.subscribers.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(Self::fan_out(&mut subs, Arc::from(json)))
    }

    fn fan_out(subs: &mut HashMap<Uuid, mpsc::Sender<Arc<str>>>, payload: Arc<str>) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in subs.iter() {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in &closed {
            subs.remove(id);
        }
        if !closed.is_empty() {
            debug!(pruned = closed.len(), "Pruned closed subscribers");
        }

        delivered
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<Arc<str>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BroadcastRelay {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
