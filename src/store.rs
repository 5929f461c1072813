//! The append-only event store.

use crate::error::{Result, StoreError};
use crate::log::EventLog;
use crate::subscriptions::{
    EventReceiver, SubscriberId, SubscriptionFilter, SubscriptionRegistry,
};
use crate::types::{EventId, EventInput, EventRecord, Position, StoreStats};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Store configuration (for durable, file-backed stores).
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base path for the store directory.
    pub path: PathBuf,

    /// Sync the durable log every N appends.
    pub sync_interval: u64,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./events"),
            sync_interval: 100,
            create_if_missing: true,
        }
    }
}

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"EVS\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// The append-only event store.
///
/// Owns the ordered event sequence, id uniqueness, and observer
/// notification. Appends are serialized through a single write lock so the
/// duplicate-check-then-insert step is atomic; reads run concurrently
/// against the in-memory log and never observe a partially appended record.
///
/// Once `append` returns, the event is recorded (and persisted, for durable
/// stores) and every live observer has already seen it.
pub struct EventStore {
    /// Events in append order. Positions index directly into this vector.
    entries: RwLock<Vec<Arc<EventRecord>>>,

    /// Id -> position, for O(1) duplicate detection and lookup.
    index: RwLock<HashMap<EventId, Position>>,

    /// Lock serializing the append path.
    write_lock: Mutex<()>,

    /// Durable log (None for in-memory stores).
    log: Option<EventLog>,

    /// Lock file for exclusive access (durable stores only).
    _lock_file: Option<File>,

    /// Observer registry, notified on every successful append.
    subscriptions: SubscriptionRegistry,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("len", &self.entries.read().len())
            .field("durable", &self.log.is_some())
            .finish_non_exhaustive()
    }
}

impl EventStore {
    /// Create a volatile, in-memory store.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            log: None,
            _lock_file: None,
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    /// Open an existing durable store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new durable store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log =
            EventLog::open_with_sync_interval(config.path.join("events.log"), config.sync_interval)?;

        Ok(Self {
            entries: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            log: Some(log),
            _lock_file: Some(lock_file),
            subscriptions: SubscriptionRegistry::new(),
        })
    }

    /// Open an existing durable store, replaying its log into memory.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log =
            EventLog::open_with_sync_interval(config.path.join("events.log"), config.sync_interval)?;

        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for record in log.read_all()? {
            // A duplicate id in the durable log means the uniqueness
            // invariant was violated on disk
            if index.contains_key(&record.id) {
                return Err(StoreError::Corruption(format!(
                    "duplicate event id {} in durable log",
                    record.id
                )));
            }
            index.insert(record.id, Position(entries.len() as u64));
            entries.push(Arc::new(record));
        }

        Ok(Self {
            entries: RwLock::new(entries),
            index: RwLock::new(index),
            write_lock: Mutex::new(()),
            log: Some(log),
            _lock_file: Some(lock_file),
            subscriptions: SubscriptionRegistry::new(),
        })
    }

    // --- Event Operations ---

    /// Append an event to the log.
    ///
    /// Fails with [`StoreError::DuplicateEvent`] if the id is already
    /// stored; the duplicate check happens before any mutation so a
    /// rejected append never partially corrupts the log. On success the
    /// event is recorded, all matching observers are notified
    /// synchronously, and the final position is returned.
    pub fn append(&self, input: EventInput) -> Result<Position> {
        let _guard = self.write_lock.lock();

        let record = input.into_record();

        if let Some(&position) = self.index.read().get(&record.id) {
            return Err(StoreError::DuplicateEvent {
                id: record.id,
                position,
            });
        }

        // Durable write first: observers must never see an event that
        // failed to persist
        if let Some(log) = &self.log {
            log.append(&record)?;
        }

        let record = Arc::new(record);
        let position;
        {
            let mut entries = self.entries.write();
            position = Position(entries.len() as u64);
            entries.push(Arc::clone(&record));
            self.index.write().insert(record.id, position);
        }

        self.subscriptions.notify(position, &record);

        Ok(position)
    }

    /// Get an event by id.
    pub fn get(&self, id: EventId) -> Result<Arc<EventRecord>> {
        let position = self
            .index
            .read()
            .get(&id)
            .copied()
            .ok_or(StoreError::EventNotFound(id))?;
        Ok(Arc::clone(&self.entries.read()[position.index()]))
    }

    /// Get an immutable view of the log between two positions.
    ///
    /// Out-of-range bounds are clamped, not errors, to keep replay callers
    /// simple.
    pub fn slice(&self, from: Position, to: Position) -> Vec<Arc<EventRecord>> {
        let entries = self.entries.read();
        let from = from.index().min(entries.len());
        let to = to.index().min(entries.len());
        if from >= to {
            return Vec::new();
        }
        entries[from..to].to_vec()
    }

    /// Total number of stored events.
    pub fn len(&self) -> u64 {
        self.entries.read().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Store statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            event_count: self.len(),
            subscriber_count: self.subscriptions.subscriber_count(),
            log_size_bytes: self.log.as_ref().map_or(0, EventLog::size),
        }
    }

    /// Force sync the durable log. No-op for in-memory stores.
    pub fn sync(&self) -> Result<()> {
        match &self.log {
            Some(log) => log.sync(),
            None => Ok(()),
        }
    }

    // --- Subscription Operations ---

    /// Register a callback observer for future appends.
    pub fn subscribe<F>(&self, filter: SubscriptionFilter, callback: F) -> SubscriberId
    where
        F: Fn(Position, &EventRecord) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(filter, callback)
    }

    /// Register a callback observer atomically with respect to appends.
    ///
    /// `init` receives the current log head (the position the next append
    /// will get) while the append lock is held, so no event can land
    /// between reading the head and installing the observer. Callers that
    /// track a watermark (like the projection manager) seed it in `init`;
    /// the first notification the observer sees is exactly the head
    /// position.
    pub fn subscribe_at_head<F, G>(
        &self,
        filter: SubscriptionFilter,
        init: G,
        callback: F,
    ) -> SubscriberId
    where
        F: Fn(Position, &EventRecord) + Send + Sync + 'static,
        G: FnOnce(Position),
    {
        let _guard = self.write_lock.lock();
        init(Position(self.entries.read().len() as u64));
        self.subscriptions.subscribe(filter, callback)
    }

    /// Register a channel observer with a bounded buffer.
    pub fn subscribe_channel(&self, filter: SubscriptionFilter, buffer_size: usize) -> EventReceiver {
        self.subscriptions.subscribe_channel(filter, buffer_size)
    }

    /// Remove an observer. Idempotent.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscriptions.unsubscribe(id);
    }

    // --- Manifest & Locking ---

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::create(manifest_path)?;

        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for EventStore {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
