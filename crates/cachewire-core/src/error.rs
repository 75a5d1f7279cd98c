//! Error types for the cache broker.
//!
//! Three domains meet here: the internal storage domain reported by a
//! [`CacheStore`](crate::store::CacheStore), the wire domain sent back to the
//! remote client, and the protocol/configuration errors of the broker itself.

use serde::{Deserialize, Serialize};

/// Errors reported by a cache store.
///
/// Success is carried by `Ok(_)`, so there is no "no error" variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The store does not implement the requested operation.
    #[error("operation not implemented by cache store")]
    NotImplemented,

    /// No cache with the requested name exists for the origin.
    #[error("cache not found")]
    NotFound,

    /// A cache with the requested name already exists for the origin.
    #[error("cache already exists")]
    Exists,

    /// The backing storage failed.
    #[error("storage failure: {message}")]
    Storage { message: String },

    /// The store is shutting down.
    #[error("cache store is closing")]
    Closing,
}

impl StorageError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Error kinds visible to the remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireError {
    NotImplemented,
    NotFound,
    Exists,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotImplemented => "not_implemented",
            Self::NotFound => "not_found",
            Self::Exists => "exists",
        };
        f.write_str(s)
    }
}

/// Map a storage error onto the wire domain.
///
/// `Storage` and `Closing` have no wire counterpart and collapse to
/// `NotFound`; the source error is logged so the collapse stays diagnosable.
pub fn translate(err: &StorageError) -> WireError {
    match err {
        StorageError::NotImplemented => WireError::NotImplemented,
        StorageError::NotFound => WireError::NotFound,
        StorageError::Exists => WireError::Exists,
        StorageError::Storage { .. } | StorageError::Closing => {
            tracing::debug!(source = %err, "collapsing storage error to not_found");
            WireError::NotFound
        }
    }
}

/// Envelope decoding failures. Raised before any store call is issued.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The envelope is not valid JSON.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope carries no `op` tag.
    #[error("envelope has no operation")]
    MissingOperation,

    /// The `op` tag names an operation the broker does not know.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The operation is known but its fields are missing or ill-typed.
    #[error("invalid fields for operation '{op}': {source}")]
    InvalidFields {
        op: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Broker-level errors.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Inbound envelope rejected.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// I/O error on the transport or a config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;
