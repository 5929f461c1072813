//! Error types for the event store.

use crate::types::{EventId, Position};
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate event id {id} (already stored at position {position})")]
    DuplicateEvent { id: EventId, position: Position },

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Projection not registered: {0}")]
    UnknownProjection(String),

    #[error("Projection already registered: {0}")]
    ProjectionExists(String),

    #[error("Rebuild already in progress for projection: {0}")]
    RebuildInProgress(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
