//! Endpoint error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for endpoint operations.
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Errors surfaced while assembling or querying an endpoint.
///
/// Connection-time failures never appear here: they are translated into
/// state transitions and show up through the status string and the
/// `disconnected` notification instead.
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
