// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Outgoing-message queue operations.

use rusqlite::params;

use crate::addressing::FullAddress;

use super::{OutgoingMessage, Storage, StorageError};

impl Storage {
    // === Outbox Operations ===

    /// Appends a message to the queue.
    pub fn enqueue_message(&self, message: &OutgoingMessage) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO outbox (id, content, destination, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                message.id,
                message.content,
                message.destination.as_ref().map(|d| d.to_string()),
                message.enqueued_at as i64,
            ],
        )?;

        Ok(())
    }

    /// Returns all queued messages in insertion order.
    pub fn queued_messages(&self) -> Result<Vec<OutgoingMessage>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content, destination, enqueued_at FROM outbox ORDER BY seq",
        )?;

        let rows = stmt.query_map([], row_to_message)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::Database)
    }

    /// Removes a delivered message. Returns false if it was already gone.
    pub fn remove_message(&self, id: &str) -> Result<bool, StorageError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM outbox WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    /// Counts queued messages.
    pub fn queued_message_count(&self) -> Result<usize, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM outbox", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Converts a database row to an OutgoingMessage.
fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutgoingMessage> {
    let destination: Option<String> = row.get(2)?;
    Ok(OutgoingMessage {
        id: row.get(0)?,
        content: row.get(1)?,
        destination: destination.as_deref().map(FullAddress::parse),
        enqueued_at: row.get::<_, i64>(3)? as u64,
    })
}
