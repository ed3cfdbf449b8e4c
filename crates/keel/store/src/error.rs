//! Store error types

use keel_types::{CodecError, ObjectKey, ResourceKind};
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Write against an object that does not exist
    #[error("Not found: {kind} {key}")]
    NotFound { kind: ResourceKind, key: ObjectKey },

    /// Create of an object that already exists
    #[error("Already exists: {kind} {key}")]
    AlreadyExists { kind: ResourceKind, key: ObjectKey },

    /// Version token did not match the stored version
    #[error("Conflict: {kind} {key} was modified concurrently")]
    Conflict { kind: ResourceKind, key: ObjectKey },

    /// Object failed to round-trip through its typed form
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
