//! Durable append-only event log.
//!
//! Sequential binary format, one length-prefixed record after another.
//! Replaying the file reproduces the exact in-memory log: same order, same
//! ids, same payloads. This file is the only persistent artifact of a
//! durable store.

use crate::error::{Result, StoreError};
use crate::types::{EventId, EventRecord, Timestamp};
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Magic bytes for each event record.
const LOG_MAGIC: &[u8; 4] = b"EVT\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Append-only event log file.
pub struct EventLog {
    /// Log file handle.
    file: RwLock<File>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// Number of writes since last sync.
    writes_since_sync: RwLock<u64>,

    /// Sync every N writes (critical for durability vs performance).
    sync_interval: u64,
}

impl EventLog {
    /// Default sync interval - sync every 100 writes for balance of
    /// durability and performance.
    const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create an event log with the default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create an event log with a custom sync interval.
    /// - sync_interval = 1: sync every write (safest, slowest)
    /// - sync_interval = 100: sync every 100 writes (good balance)
    /// - sync_interval = 1000: sync every 1000 writes (fastest, least durable)
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;

        let file_size = file.metadata()?.len();

        Ok(Self {
            file: RwLock::new(file),
            file_size: RwLock::new(file_size),
            writes_since_sync: RwLock::new(0),
            sync_interval: if sync_interval == 0 { 1 } else { sync_interval },
        })
    }

    /// Append a record to the log. Returns the offset where it was written.
    pub fn append(&self, record: &EventRecord) -> Result<u64> {
        let mut file = self.file.write();

        let offset = *self.file_size.read();
        file.seek(SeekFrom::Start(offset))?;

        Self::write_record(&mut file, record)?;

        let new_size = file.stream_position()?;
        *self.file_size.write() = new_size;

        // Sync periodically based on sync_interval
        let mut writes = self.writes_since_sync.write();
        *writes += 1;
        if *writes >= self.sync_interval {
            file.sync_all()?;
            *writes = 0;
        }

        Ok(offset)
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.write();
        file.sync_all()?;
        *self.writes_since_sync.write() = 0;
        Ok(())
    }

    /// Get current file size.
    pub fn size(&self) -> u64 {
        *self.file_size.read()
    }

    /// Read every record from the start of the file, in order.
    ///
    /// Used to restore an EventStore on open. Corruption (bad magic, bad
    /// checksum, truncated record) surfaces as an error rather than a
    /// silently shortened log.
    pub fn read_all(&self) -> Result<Vec<EventRecord>> {
        let mut file = self.file.write();
        let end = *self.file_size.read();
        file.seek(SeekFrom::Start(0))?;

        let mut records = Vec::new();
        while file.stream_position()? < end {
            records.push(Self::read_record(&mut file)?);
        }
        Ok(records)
    }

    /// Write a record to the file.
    fn write_record(file: &mut File, record: &EventRecord) -> Result<()> {
        // Length fields are u16/u32; reject oversized records before any
        // bytes hit the file so a failed append never corrupts the framing
        if record.event_type.len() > u16::MAX as usize {
            return Err(StoreError::InvalidFormat(format!(
                "event type too long: {} bytes (max {})",
                record.event_type.len(),
                u16::MAX
            )));
        }

        let payload = serde_json::to_vec(&record.payload)?;
        if payload.len() > u32::MAX as usize {
            return Err(StoreError::InvalidFormat(format!(
                "payload too large: {} bytes (max {})",
                payload.len(),
                u32::MAX
            )));
        }

        // Magic
        file.write_all(LOG_MAGIC)?;

        // Version
        file.write_all(&[LOG_VERSION])?;

        // Flags (reserved)
        file.write_all(&[0u8])?;

        // Event ID
        file.write_all(&record.id.0.to_le_bytes())?;

        // Timestamp
        file.write_all(&record.timestamp.0.to_le_bytes())?;

        // Schema version
        file.write_all(&record.schema_version.to_le_bytes())?;

        // Type
        let type_bytes = record.event_type.as_bytes();
        file.write_all(&(type_bytes.len() as u16).to_le_bytes())?;
        file.write_all(type_bytes)?;

        // Payload (JSON)
        file.write_all(&(payload.len() as u32).to_le_bytes())?;
        file.write_all(&payload)?;

        // Payload checksum
        let checksum = crc32fast::hash(&payload);
        file.write_all(&checksum.to_le_bytes())?;

        Ok(())
    }

    /// Read a record from the file at the current position.
    fn read_record(file: &mut File) -> Result<EventRecord> {
        // Magic
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != LOG_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid record magic".into()));
        }

        // Version
        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != LOG_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported log version: {}",
                version[0]
            )));
        }

        // Flags
        let mut _flags = [0u8; 1];
        file.read_exact(&mut _flags)?;

        // Event ID
        let mut id_bytes = [0u8; 8];
        file.read_exact(&mut id_bytes)?;
        let id = EventId(u64::from_le_bytes(id_bytes));

        // Timestamp
        let mut ts_bytes = [0u8; 8];
        file.read_exact(&mut ts_bytes)?;
        let timestamp = Timestamp(i64::from_le_bytes(ts_bytes));

        // Schema version
        let mut schema_bytes = [0u8; 4];
        file.read_exact(&mut schema_bytes)?;
        let schema_version = u32::from_le_bytes(schema_bytes);

        // Type
        let mut type_len_bytes = [0u8; 2];
        file.read_exact(&mut type_len_bytes)?;
        let type_len = u16::from_le_bytes(type_len_bytes) as usize;
        let mut type_bytes = vec![0u8; type_len];
        file.read_exact(&mut type_bytes)?;
        let event_type = String::from_utf8_lossy(&type_bytes).into_owned();

        // Payload
        let mut payload_len_bytes = [0u8; 4];
        file.read_exact(&mut payload_len_bytes)?;
        let payload_len = u32::from_le_bytes(payload_len_bytes) as usize;
        let mut payload_bytes = vec![0u8; payload_len];
        file.read_exact(&mut payload_bytes)?;

        // Checksum
        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&payload_bytes);

        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let payload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

        Ok(EventRecord {
            id,
            event_type,
            payload,
            timestamp,
            schema_version,
        })
    }
}
