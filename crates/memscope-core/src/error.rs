//! Error types for memscope

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::Capability;

/// Errors that can occur in the scoped memory store.
///
/// A missing key is not an error: `get` returns `Ok(None)`.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Required option missing or invalid at `initialize`
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Optional operation invoked on a backend that lacks it
    #[error("Capability not supported: {capability} is not available on the {backend} backend")]
    CapabilityNotSupported {
        capability: Capability,
        backend: &'static str,
    },

    /// Operation issued before `initialize`
    #[error("Provider not initialized")]
    NotInitialized,

    /// Operation issued after `close`
    #[error("Provider closed")]
    ProviderClosed,

    /// Underlying disk failure
    #[error("Storage I/O failed at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted data corrupt or unreadable
    #[error("Serialization failed ({context}): {message}")]
    Serialization { context: String, message: String },

    /// Database backend error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transaction could not be committed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Argument rejected by the backend
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl MemoryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MemoryError::StorageIo {
            path: path.into(),
            source,
        }
    }

    pub fn serialization(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        MemoryError::Serialization {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::serialization("json", err)
    }
}

/// Result type for memscope operations
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
