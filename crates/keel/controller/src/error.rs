//! Error types for the controller

use keel_store::StoreError;
use keel_types::{CodecError, ObjectKey, SpecValidationError};
use thiserror::Error;

use crate::license::LicenseError;

/// Reconcile error type. None of these are fatal; every one leads to a
/// requeue of the affected key.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Store subsystem error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Object failed to convert to its typed form
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Desired state failed validation
    #[error("Invalid spec for {key}: {source}")]
    InvalidSpec {
        key: ObjectKey,
        #[source]
        source: SpecValidationError,
    },

    /// A referenced object does not exist yet
    #[error("Dependency not ready: {0}")]
    DependencyNotReady(String),

    /// Licensing authority call failed
    #[error("License error: {0}")]
    License(#[from] LicenseError),

    /// Finalization failed; the finalizer stays in place
    #[error("Finalization failed for {key}: {reason}")]
    Finalization { key: ObjectKey, reason: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

impl ControllerError {
    /// Lost an optimistic-concurrency race; re-fetch and recompute
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ControllerError::Store(StoreError::Conflict { .. } | StoreError::AlreadyExists { .. })
        )
    }

    pub fn dependency_not_ready(what: impl std::fmt::Display) -> Self {
        Self::DependencyNotReady(what.to_string())
    }
}
