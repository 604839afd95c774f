// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! SQLite-backed storage for the outgoing-message queue. Messages queued
//! while the session is down must survive process restarts, so the queue is
//! written through to disk on every enqueue.

mod error;
pub mod migration;
mod outbox;

pub use error::{OutgoingMessage, StorageError};

use rusqlite::Connection;
use std::path::Path;

/// SQLite-based storage implementation.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Storage { conn };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Creates an in-memory storage (for testing and ephemeral endpoints).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Storage { conn };
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Runs all pending schema migrations.
    fn run_migrations(&self) -> Result<(), StorageError> {
        let migrations = migration::all_migrations();
        migration::MigrationRunner::run(&self.conn, &migrations)
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn)
    }
}
