//! Storage error and record types.

use thiserror::Error;

use crate::addressing::FullAddress;

/// Storage error types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// An outbound message waiting for a usable session.
///
/// `destination: None` means the message is a broadcast resolved against the
/// authorized-peer presences at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Unique message ID (UUID v4).
    pub id: String,
    /// Message body.
    pub content: String,
    /// Explicit destination, or `None` for a broadcast.
    pub destination: Option<FullAddress>,
    /// Unix timestamp when the message was queued.
    pub enqueued_at: u64,
}

impl OutgoingMessage {
    /// Creates a message with a fresh ID and the current timestamp.
    pub fn new(content: &str, destination: Option<FullAddress>) -> Self {
        let enqueued_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time before UNIX epoch")
            .as_secs();

        OutgoingMessage {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            destination,
            enqueued_at,
        }
    }
}
