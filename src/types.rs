//! Core types for the event store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for an event.
///
/// Ids are caller-supplied, which makes retries idempotent: re-appending an
/// event with an id the store has already seen fails with
/// [`DuplicateEvent`](crate::StoreError::DuplicateEvent) instead of silently
/// duplicating the fact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based position in the log.
///
/// Insertion order is the only source of truth for "what happened before
/// what"; positions are assigned by the store at append time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Position(pub u64);

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Position {
    pub fn next(self) -> Self {
        Position(self.0 + 1)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A single immutable event in the log.
///
/// Once appended an event's fields never change; projections and temporal
/// replay assume past events never mutate. The store hands out
/// `Arc<EventRecord>` and keeps no mutable access path to stored events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    /// Caller-supplied unique identifier.
    pub id: EventId,

    /// Application-defined type tag (e.g., "order_created").
    pub event_type: String,

    /// Application-defined structured payload.
    pub payload: serde_json::Value,

    /// When the event occurred. Used by temporal queries.
    pub timestamp: Timestamp,

    /// Schema version of the payload, for forward compatibility.
    pub schema_version: u32,
}

impl EventRecord {
    /// Ordering key for temporal queries: timestamp, then id as tie-break.
    pub fn temporal_key(&self) -> (Timestamp, EventId) {
        (self.timestamp, self.id)
    }
}

/// Input for appending a new event (before a position is assigned).
#[derive(Clone, Debug)]
pub struct EventInput {
    pub id: EventId,
    pub event_type: String,
    pub payload: serde_json::Value,
    /// When the event occurred. `None` means "now" at append time.
    pub timestamp: Option<Timestamp>,
    pub schema_version: u32,
}

impl EventInput {
    /// Create an event input with an already-built JSON payload.
    pub fn new(id: EventId, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id,
            event_type: event_type.into(),
            payload,
            timestamp: None,
            schema_version: 1,
        }
    }

    /// Create an event input by serializing any payload to JSON.
    pub fn json(
        id: EventId,
        event_type: impl Into<String>,
        payload: &impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(id, event_type, serde_json::to_value(payload)?))
    }

    /// Set an explicit occurrence time.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the payload schema version.
    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Finalize into an immutable record, defaulting the timestamp to now.
    pub(crate) fn into_record(self) -> EventRecord {
        EventRecord {
            id: self.id,
            event_type: self.event_type,
            payload: self.payload,
            timestamp: self.timestamp.unwrap_or_else(Timestamp::now),
            schema_version: self.schema_version,
        }
    }
}

/// Cancellation flag for long-running replays (rebuilds, temporal queries).
///
/// Cloneable; checked between applied events. Appends and point lookups are
/// O(1) and take no token.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The running scan returns
    /// [`Cancelled`](crate::StoreError::Cancelled) at its next check.
    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::Acquire)
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub event_count: u64,
    pub subscriber_count: usize,
    /// Size of the durable log in bytes (0 for in-memory stores).
    pub log_size_bytes: u64,
}
