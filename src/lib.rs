//! # Chronolog
//!
//! An append-only, in-process event store with materialized projections,
//! observer subscriptions, and temporal queries.
//!
//! ## Core Concepts
//!
//! - **Events**: Immutable facts with caller-supplied ids; duplicates are
//!   rejected, never merged
//! - **Projections**: Named views folded from the event sequence, rebuildable
//!   from scratch at any time
//! - **Subscriptions**: Synchronous observer notification on every append
//! - **Temporal queries**: State reconstruction as of any historical point
//!
//! ## Example
//!
//! ```ignore
//! use chronolog::{
//!     Boundary, EventId, EventInput, EventStore, OrderTotals,
//!     ProjectionManager, TemporalQueryEngine, Timestamp,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = Arc::new(EventStore::in_memory());
//! let projections = ProjectionManager::new(Arc::clone(&store));
//! projections.register(Box::new(OrderTotals::new()))?;
//!
//! store.append(EventInput::new(
//!     EventId(1),
//!     "order_created",
//!     json!({"order": "A", "amount": 10}),
//! ))?;
//!
//! // Live view
//! let totals = projections.get("order_totals")?;
//!
//! // Time travel
//! let engine = TemporalQueryEngine::new(Arc::clone(&store));
//! let then = engine.as_of(
//!     Boundary::Timestamp(Timestamp(1_700_000_000_000_000)),
//!     || Box::new(OrderTotals::new()),
//! )?;
//! ```

pub mod error;
pub mod log;
pub mod projections;
pub mod store;
pub mod subscriptions;
pub mod temporal;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use log::EventLog;
pub use projections::{
    EventTypeCounts, OrderTotals, Projection, ProjectionManager, ProjectionStatus,
};
pub use store::{EventStore, StoreConfig};
pub use subscriptions::{
    DropReason, EventReceiver, StoreEvent, SubscriberId, SubscriptionFilter, SubscriptionRegistry,
};
pub use temporal::{Boundary, TemporalQueryEngine};
pub use types::*;
