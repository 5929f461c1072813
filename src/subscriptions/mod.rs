//! Subscription system for live event delivery.
//!
//! This module provides in-process observation of appended events:
//! - Callback observers, invoked synchronously on the appending thread
//! - Channel observers with bounded buffers and slow-subscriber dropping
//!
//! Observers are isolated from each other: a panicking callback is logged
//! and skipped, and never fails the append or the remaining observers.
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::new();
//!
//! // Observe order events in-line
//! let id = registry.subscribe(
//!     SubscriptionFilter::event_types(vec!["order_created".to_string()]),
//!     |position, event| println!("{position}: {event:?}"),
//! );
//!
//! // Or consume over a channel
//! let handle = registry.subscribe_channel(SubscriptionFilter::all(), 1000);
//! loop {
//!     match handle.recv() {
//!         Ok(StoreEvent::Appended { event, .. }) => println!("Got event: {:?}", event),
//!         Ok(StoreEvent::Dropped { .. }) | Err(_) => break,
//!     }
//! }
//! ```

mod registry;
mod types;

pub use registry::{ObserverFn, SubscriptionRegistry};
pub use types::{DropReason, EventReceiver, StoreEvent, SubscriberId, SubscriptionFilter};
