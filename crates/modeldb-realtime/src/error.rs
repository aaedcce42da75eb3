//! Error types for the realtime model.

use thiserror::Error;

/// Errors that can occur in realtime model operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("No document registered for path: {0}")]
    PathNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object {0} belongs to a different model")]
    ForeignObject(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
