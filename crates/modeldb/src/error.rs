//! Error types for the path store.

use modeldb_realtime::RealtimeError;
use thiserror::Error;

/// Errors produced by [`PathStore`](crate::PathStore) and its adapters.
///
/// Errors are `Clone` so a failed resolution can be handed to every
/// caller waiting on `connected()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelDbError {
    /// The resolver could not map the file path to a document.
    #[error("Resolution failed: {0}")]
    Resolution(RealtimeError),

    /// The loader could not open the resolved document.
    #[error("Load failed: {0}")]
    Load(RealtimeError),

    /// A path holds something other than what the caller asked for.
    #[error("Kind mismatch at '{path}': expected {expected}, found {found}")]
    KindMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// The store has been disposed.
    #[error("Store is disposed")]
    Disposed,

    /// Invalid store options.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, ModelDbError>;
