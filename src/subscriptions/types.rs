//! Subscription types for live event delivery.

use crate::types::{EventRecord, Position};
use std::sync::Arc;

/// Unique identifier for a subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Filter criteria for a subscription.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only deliver events with these types (None = all types).
    pub event_types: Option<Vec<String>>,
}

impl SubscriptionFilter {
    /// Subscribe to every event.
    pub fn all() -> Self {
        Self { event_types: None }
    }

    /// Subscribe to specific event types.
    pub fn event_types(types: Vec<String>) -> Self {
        Self {
            event_types: Some(types),
        }
    }

    /// Check whether an event passes this filter.
    pub fn matches(&self, event: &EventRecord) -> bool {
        match &self.event_types {
            Some(types) => types.iter().any(|t| t == &event.event_type),
            None => true,
        }
    }
}

/// Events delivered to channel subscribers.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    /// A new event was appended.
    Appended {
        position: Position,
        event: Arc<EventRecord>,
    },

    /// The subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Handle for receiving events over a channel subscription.
pub struct EventReceiver {
    pub id: SubscriberId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<StoreEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
