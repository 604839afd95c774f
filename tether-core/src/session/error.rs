//! Session error types.

use thiserror::Error;

/// Errors from operations on an established session.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("session is not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("probe failed: {0}")]
    ProbeFailed(String),

    #[error("close failed: {0}")]
    CloseFailed(String),
}

/// Authentication outcomes other than success.
///
/// A missing answer is retryable; an explicit rejection means the stored
/// credentials are wrong and retrying cannot help.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("no response from server")]
    NoResponse,

    #[error("authentication rejected: {0}")]
    Rejected(String),
}

/// Errors while opening the transport-level link.
#[derive(Error, Debug, Clone)]
pub enum ConnectError {
    /// Name resolution, unreachable hosts, timeouts. Worth retrying.
    #[error("connect failed: {0}")]
    Transient(String),

    /// Broken endpoint configuration. Retrying cannot help.
    #[error("connect failed permanently: {0}")]
    Fatal(String),
}
