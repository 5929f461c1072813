//! Subscription registry: dispatches appended events to observers.
//!
//! Dispatch is synchronous on the appending thread, in registration order.
//! Callback observers run inside a panic boundary so one broken observer
//! never fails the append or starves the others. Channel observers follow
//! the slow-consumer policy: a full buffer drops the subscription.

use crate::types::{EventRecord, Position};
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{DropReason, EventReceiver, StoreEvent, SubscriberId, SubscriptionFilter};

/// Callback invoked for each appended event that passes the filter.
pub type ObserverFn = Box<dyn Fn(Position, &EventRecord) + Send + Sync>;

/// How events reach a subscriber.
enum SubscriberKind {
    /// Invoked in-line on the appending thread.
    Callback(ObserverFn),
    /// Buffered channel; dropped on overflow.
    Channel(Sender<StoreEvent>),
}

/// Internal subscriber state.
struct Subscriber {
    id: SubscriberId,
    filter: SubscriptionFilter,
    kind: SubscriberKind,
}

impl Subscriber {
    /// Try to push an event into a channel subscriber.
    /// Returns false if the buffer is full or disconnected.
    fn try_send(&self, event: StoreEvent) -> bool {
        match &self.kind {
            SubscriberKind::Channel(sender) => sender.try_send(event).is_ok(),
            SubscriberKind::Callback(_) => true,
        }
    }
}

/// Holds observers and dispatches appended events to them.
pub struct SubscriptionRegistry {
    /// Subscribers in registration order (delivery order follows it).
    /// Arc'd so `notify` can snapshot the list and invoke callbacks with
    /// no lock held; a callback may then subscribe or unsubscribe freely.
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    /// Counter for generating subscriber IDs.
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback observer. The callback runs synchronously on the
    /// appending thread for every event matching the filter.
    pub fn subscribe<F>(&self, filter: SubscriptionFilter, callback: F) -> SubscriberId
    where
        F: Fn(Position, &EventRecord) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().push(Arc::new(Subscriber {
            id,
            filter,
            kind: SubscriberKind::Callback(Box::new(callback)),
        }));
        id
    }

    /// Register a channel observer with a bounded buffer.
    ///
    /// Returns a handle for receiving events. If the consumer falls behind
    /// and the buffer fills up, the subscription is dropped with a
    /// best-effort [`StoreEvent::Dropped`] notice.
    pub fn subscribe_channel(
        &self,
        filter: SubscriptionFilter,
        buffer_size: usize,
    ) -> EventReceiver {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size);

        self.subscribers.write().push(Arc::new(Subscriber {
            id,
            filter,
            kind: SubscriberKind::Channel(sender),
        }));

        EventReceiver { id, receiver }
    }

    /// Remove a subscriber. Idempotent: unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut subs = self.subscribers.write();
        if let Some(pos) = subs.iter().position(|s| s.id == id) {
            let sub = subs.remove(pos);
            // Best-effort dropped notice for channel subscribers
            let _ = sub.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an appended event to every matching subscriber, in
    /// registration order.
    ///
    /// Called by the store after the event is recorded, on the writer
    /// thread. A panicking callback is logged and skipped; a channel
    /// subscriber whose buffer is full is dropped.
    pub fn notify(&self, position: Position, event: &Arc<EventRecord>) {
        // Snapshot the matching subscribers first. Callbacks run with no
        // lock held, so an observer may subscribe or unsubscribe from
        // inside its own callback without deadlocking the writer thread.
        let matching: Vec<Arc<Subscriber>> = self
            .subscribers
            .read()
            .iter()
            .filter(|sub| sub.filter.matches(event))
            .map(Arc::clone)
            .collect();

        let mut to_remove = Vec::new();
        for sub in &matching {
            match &sub.kind {
                SubscriberKind::Callback(callback) => {
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| callback(position, event)));
                    if result.is_err() {
                        tracing::warn!(
                            event_id = %event.id,
                            subscriber = sub.id.0,
                            "observer panicked during notify; skipping it for this event"
                        );
                    }
                }
                SubscriberKind::Channel(_) => {
                    let delivery = StoreEvent::Appended {
                        position,
                        event: Arc::clone(event),
                    };
                    if !sub.try_send(delivery) {
                        to_remove.push(sub.id);
                    }
                }
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                if let Some(pos) = subs.iter().position(|s| s.id == id) {
                    let sub = subs.remove(pos);
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.try_send(StoreEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
