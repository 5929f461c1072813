//! Projection manager: owns live projections and coordinates rebuilds.

use super::Projection;
use crate::error::{Result, StoreError};
use crate::store::EventStore;
use crate::subscriptions::{SubscriberId, SubscriptionFilter};
use crate::types::{CancelToken, EventRecord, Position};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Per-projection state shared with its live observer callback.
struct Slot {
    /// The projection itself. The live callback and rebuild both go through
    /// this mutex, so live applies queue behind a replay instead of
    /// interleaving with it.
    projection: Mutex<Box<dyn Projection>>,

    /// Number of log positions folded in so far. The projection is
    /// consistent when this equals the store length.
    last_applied: AtomicU64,

    /// Rebuild-in-progress flag; a second concurrent rebuild is rejected.
    rebuilding: AtomicBool,
}

struct Registered {
    slot: Arc<Slot>,
    subscriber: SubscriberId,
}

/// Observable consistency of a registered projection.
#[derive(Clone, Debug)]
pub struct ProjectionStatus {
    pub name: String,
    /// How far into the log this projection has consumed.
    pub last_applied_position: u64,
    pub store_length: u64,
    /// True when the projection has consumed the whole log.
    pub consistent: bool,
    pub rebuilding: bool,
}

/// Clears the rebuild flag when the rebuild scope exits, error paths
/// included.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the set of live projections.
///
/// Registered projections receive every appended event via the store's
/// subscription registry. A projection registered while the log already has
/// history starts live from the registration point; call
/// [`rebuild`](ProjectionManager::rebuild) to fold in the history.
pub struct ProjectionManager {
    store: Arc<EventStore>,
    slots: RwLock<HashMap<String, Registered>>,
}

impl ProjectionManager {
    /// Create a manager over an explicit store instance (no globals; tests
    /// construct isolated stores).
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Register a projection and subscribe it to future appends.
    pub fn register(&self, projection: Box<dyn Projection>) -> Result<()> {
        let name = projection.name().to_string();
        let mut slots = self.slots.write();
        if slots.contains_key(&name) {
            return Err(StoreError::ProjectionExists(name));
        }

        let slot = Arc::new(Slot {
            projection: Mutex::new(projection),
            last_applied: AtomicU64::new(0),
            rebuilding: AtomicBool::new(false),
        });

        // Seeding the watermark and installing the observer happen under
        // the store's append lock, so no event can land between the two.
        // The projection is live from the head at registration; history is
        // folded in by rebuild()
        let live = Arc::clone(&slot);
        let subscriber = self.store.subscribe_at_head(
            SubscriptionFilter::all(),
            |head| slot.last_applied.store(head.0, Ordering::Release),
            move |position, event| {
                Self::apply_live(&live, position, event);
            },
        );

        slots.insert(name, Registered { slot, subscriber });
        Ok(())
    }

    /// Live observer path: fold one appended event into the projection.
    fn apply_live(slot: &Slot, position: Position, event: &EventRecord) {
        let mut projection = slot.projection.lock();
        // Apply only the next expected position. Earlier positions were
        // already covered by a rebuild replay; a later one means the
        // projection missed events (e.g. a cancelled rebuild) and must
        // stay visibly stale until rebuilt, never silently skip the gap
        if position.0 != slot.last_applied.load(Ordering::Acquire) {
            return;
        }
        projection.apply(event);
        slot.last_applied.store(position.0 + 1, Ordering::Release);
    }

    /// Rebuild a projection from scratch by replaying the whole log.
    ///
    /// Recovers a projection after a bug fix to its `apply` logic, or
    /// bootstraps a projection registered after the log already had
    /// history. Fails with [`StoreError::RebuildInProgress`] if another
    /// rebuild of the same projection is running.
    pub fn rebuild(&self, name: &str) -> Result<()> {
        self.rebuild_inner(name, None)
    }

    /// Rebuild with a cancellation token, checked between applied events.
    ///
    /// On cancellation the projection is left at the replayed prefix:
    /// stale but well-defined (`status` reports it behind), recoverable by
    /// another rebuild.
    pub fn rebuild_with_cancel(&self, name: &str, cancel: &CancelToken) -> Result<()> {
        self.rebuild_inner(name, Some(cancel))
    }

    fn rebuild_inner(&self, name: &str, cancel: Option<&CancelToken>) -> Result<()> {
        let slot = self.slot(name)?;

        if slot.rebuilding.swap(true, Ordering::AcqRel) {
            return Err(StoreError::RebuildInProgress(name.to_string()));
        }
        let _guard = RebuildGuard(&slot.rebuilding);

        // Holding the projection mutex for the whole replay queues live
        // applies behind it
        let mut projection = slot.projection.lock();
        let len = self.store.len();
        projection.reset();
        slot.last_applied.store(0, Ordering::Release);

        let events = self.store.slice(Position(0), Position(len));
        for (i, event) in events.iter().enumerate() {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    slot.last_applied.store(i as u64, Ordering::Release);
                    return Err(StoreError::Cancelled);
                }
            }
            projection.apply(event);
        }

        slot.last_applied.store(len, Ordering::Release);
        tracing::debug!(projection = name, events = len, "rebuilt projection");
        Ok(())
    }

    /// Snapshot of the named projection's materialized state.
    pub fn get(&self, name: &str) -> Result<serde_json::Value> {
        let slot = self.slot(name)?;
        let projection = slot.projection.lock();
        Ok(projection.snapshot())
    }

    /// Consistency status of the named projection. A projection that has
    /// fallen behind is visible here, never silent.
    pub fn status(&self, name: &str) -> Result<ProjectionStatus> {
        let slot = self.slot(name)?;
        let last_applied = slot.last_applied.load(Ordering::Acquire);
        let store_length = self.store.len();
        Ok(ProjectionStatus {
            name: name.to_string(),
            last_applied_position: last_applied,
            store_length,
            consistent: last_applied == store_length,
            rebuilding: slot.rebuilding.load(Ordering::Acquire),
        })
    }

    /// Remove a projection and unsubscribe it. Returns false if it was not
    /// registered.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.slots.write().remove(name);
        match removed {
            Some(registered) => {
                self.store.unsubscribe(registered.subscriber);
                true
            }
            None => false,
        }
    }

    /// Names of all registered projections, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn slot(&self, name: &str) -> Result<Arc<Slot>> {
        self.slots
            .read()
            .get(name)
            .map(|r| Arc::clone(&r.slot))
            .ok_or_else(|| StoreError::UnknownProjection(name.to_string()))
    }
}
