//! Error types for the progress store

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors surfaced by the store, lock, and tracker layers
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Workspace document does not exist
    #[error("workspace not found: {0}")]
    NotFound(String),

    /// Operation referenced an item id the workspace does not track
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// Document parsed but failed schema validation
    #[error("invalid workspace document: {0}")]
    Format(String),

    /// Document does not parse and backup recovery also failed
    #[error("workspace corrupted beyond recovery: {0}")]
    Corruption(String),

    /// Mutation attempted through a read-only store
    #[error("store is open read-only")]
    ReadOnly,

    /// Item already tracked with conflicting content
    #[error("conflicting item: {0}")]
    Conflict(String),

    /// Lock not acquired within the caller-specified bound
    #[error("lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// Lock file could not be created or locked
    #[error("lock error: {0}")]
    Lock(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// Create a not found error for a workspace path
    pub fn not_found<D: fmt::Display>(path: D) -> Self {
        Self::NotFound(path.to_string())
    }

    /// Create a not found error for an item id
    pub fn item_not_found<D: fmt::Display>(id: D) -> Self {
        Self::ItemNotFound(id.to_string())
    }

    /// Create a format error
    pub fn format<D: fmt::Display>(msg: D) -> Self {
        Self::Format(msg.to_string())
    }

    /// Create a corruption error
    pub fn corruption<D: fmt::Display>(msg: D) -> Self {
        Self::Corruption(msg.to_string())
    }

    /// Create a conflict error
    pub fn conflict<D: fmt::Display>(msg: D) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Create a lock error
    pub fn lock<D: fmt::Display>(msg: D) -> Self {
        Self::Lock(msg.to_string())
    }

    /// Check if this is a not found error (workspace or item)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ItemNotFound(_))
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this is a read-only rejection
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    /// Check if this is a retryable lock failure
    pub fn is_lock_failure(&self) -> bool {
        matches!(self, Self::Lock(_) | Self::LockTimeout(_))
    }
}
