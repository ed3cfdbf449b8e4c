//! Error types for the object model

use crate::ResourceKind;
use thiserror::Error;

/// Validation failure of a desired-state spec
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecValidationError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("replicas {requested} exceeds the supported maximum of {max}")]
    TooManyReplicas { requested: u32, max: u32 },
}

/// Failure converting between typed resources and their dynamic form
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("kind {0} is not registered")]
    Unregistered(ResourceKind),

    #[error("manifest is missing the `kind` field")]
    MissingKind,

    #[error("expected kind {expected}, got {actual}")]
    KindMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("malformed {kind} object: {source}")]
    Malformed {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },
}
