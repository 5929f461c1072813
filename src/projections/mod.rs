//! Projections: materialized views derived from the event log.
//!
//! A projection is a named left-fold over the event sequence. Its state at
//! position N is reproducible by replaying events `[0..N)` into a fresh
//! instance, which is exactly what [`ProjectionManager::rebuild`] and the
//! temporal query engine do.

mod builtin;
mod manager;

pub use builtin::{EventTypeCounts, OrderTotals};
pub use manager::{ProjectionManager, ProjectionStatus};

use crate::types::EventRecord;

/// A materialized view folded from the event sequence.
///
/// # Contract
///
/// - [`apply`](Projection::apply) must be a pure function of
///   (current state, event): no wall-clock reads, no reads of other
///   projections. Unknown or irrelevant event types are ignored, not
///   errors, so new event types can be introduced without breaking old
///   projections.
/// - [`snapshot`](Projection::snapshot) returns plain structured data and
///   never exposes internal mutable state.
/// - [`reset`](Projection::reset) returns the projection to its empty
///   state; a reset followed by a full replay must equal incremental
///   application of the same events.
pub trait Projection: Send {
    /// Name used for registration, rebuild, and queries.
    fn name(&self) -> &str;

    /// Fold one event into the materialized state.
    fn apply(&mut self, event: &EventRecord);

    /// Read-only copy of the current state.
    fn snapshot(&self) -> serde_json::Value;

    /// Clear state back to empty (start of a rebuild).
    fn reset(&mut self);
}
