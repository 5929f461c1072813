//! Temporal queries: point-in-time state reconstruction.
//!
//! A temporal query replays a prefix of the log into a fresh projection
//! instance and returns its snapshot. It never touches a live, registered
//! projection; time travel is read-only.

use crate::error::{Result, StoreError};
use crate::projections::Projection;
use crate::store::EventStore;
use crate::types::{CancelToken, Position, Timestamp};
use std::sync::Arc;

/// Where in history to reconstruct state.
#[derive(Clone, Copy, Debug)]
pub enum Boundary {
    /// Include events up to and including this position.
    Position(Position),
    /// Include events that occurred at or before this time.
    Timestamp(Timestamp),
}

/// Reconstructs historical state by replaying log prefixes.
pub struct TemporalQueryEngine {
    store: Arc<EventStore>,
}

impl TemporalQueryEngine {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    /// Materialized state as of a historical boundary.
    ///
    /// Constructs a fresh instance via `factory`, replays the log prefix up
    /// to the boundary into it, and returns its snapshot. The prefix is
    /// taken when the call begins; events appended afterwards do not affect
    /// the result. A boundary before the first event yields the empty
    /// projection's snapshot.
    pub fn as_of<F>(&self, boundary: Boundary, factory: F) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Box<dyn Projection>,
    {
        self.replay(boundary, factory, None)
    }

    /// Same as [`as_of`](Self::as_of), checking a cancellation token
    /// between applied events (temporal queries are potentially long scans).
    pub fn as_of_with_cancel<F>(
        &self,
        boundary: Boundary,
        factory: F,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Box<dyn Projection>,
    {
        self.replay(boundary, factory, Some(cancel))
    }

    fn replay<F>(
        &self,
        boundary: Boundary,
        factory: F,
        cancel: Option<&CancelToken>,
    ) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Box<dyn Projection>,
    {
        let end = self.prefix_end(boundary);
        let events = self.store.slice(Position(0), end);

        let mut projection = factory();
        // Defined empty starting point even if the factory handed over a
        // used instance
        projection.reset();

        for event in &events {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(StoreError::Cancelled);
                }
            }
            projection.apply(event);
        }

        Ok(projection.snapshot())
    }

    /// Exclusive end position of the replay prefix for a boundary.
    ///
    /// Timestamps are caller-supplied and not required to be monotone over
    /// the log, so the timestamp case scans for the last position at or
    /// before the boundary rather than binary-searching.
    fn prefix_end(&self, boundary: Boundary) -> Position {
        match boundary {
            Boundary::Position(position) => position.next(),
            Boundary::Timestamp(timestamp) => {
                let entries = self.store.slice(Position(0), Position(self.store.len()));
                let mut end = Position(0);
                for (i, event) in entries.iter().enumerate() {
                    if event.timestamp <= timestamp {
                        end = Position(i as u64 + 1);
                    }
                }
                end
            }
        }
    }
}
