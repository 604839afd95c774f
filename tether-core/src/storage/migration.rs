// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Database Schema Migration Framework
//!
//! Versioned schema migrations with transactional safety. Each migration has
//! a version number, name, and either SQL or a Rust callback. The runner
//! tracks applied versions in a `schema_version` table and runs pending
//! migrations in order within a single transaction.

use rusqlite::Connection;

use super::StorageError;

/// A single schema migration step.
pub struct Migration {
    /// Monotonically increasing version number (starting at 1).
    pub version: u32,
    /// Human-readable name for this migration.
    pub name: &'static str,
    /// The migration action: either SQL or a Rust callback.
    pub action: MigrationAction,
}

/// The action a migration performs.
pub enum MigrationAction {
    /// Pure SQL migration.
    Sql(&'static str),
    /// Rust callback migration (for data transformations).
    Callback(fn(&Connection) -> Result<(), StorageError>),
}

/// Returns all migrations, in version order.
pub fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        name: "create_outbox",
        action: MigrationAction::Sql(
            "CREATE TABLE outbox (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                destination TEXT,
                enqueued_at INTEGER NOT NULL
            );",
        ),
    }]
}

/// Runs schema migrations against a database connection.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Runs all pending migrations in a transaction.
    ///
    /// Creates the `schema_version` table if it doesn't exist, then applies
    /// any migrations whose version is greater than the current schema
    /// version. All pending migrations run within a single transaction — if
    /// any migration fails, all changes are rolled back.
    pub fn run(conn: &Connection, migrations: &[Migration]) -> Result<(), StorageError> {
        // Create the schema_version table if it doesn't exist (outside the
        // transaction, since we need to read it before starting it).
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )?;

        let current_version = Self::current_version(conn)?;

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        // Verify migrations are in order
        for window in pending.windows(2) {
            if window[0].version >= window[1].version {
                return Err(StorageError::Migration(format!(
                    "Migrations are not in order: v{} before v{}",
                    window[0].version, window[1].version
                )));
            }
        }

        conn.execute_batch("BEGIN")?;

        for migration in &pending {
            let result = match &migration.action {
                MigrationAction::Sql(sql) => conn.execute_batch(sql).map_err(StorageError::from),
                MigrationAction::Callback(callback) => callback(conn),
            };

            if let Err(e) = result {
                conn.execute_batch("ROLLBACK")?;
                return Err(StorageError::Migration(format!(
                    "Migration v{} ({}) failed: {}",
                    migration.version, migration.name, e
                )));
            }

            let applied_at = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time before UNIX epoch")
                .as_secs() as i64;

            if let Err(e) = conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, applied_at],
            ) {
                conn.execute_batch("ROLLBACK")?;
                return Err(StorageError::Database(e));
            }
        }

        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Returns the current schema version (0 if no migrations have run).
    pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
        let version: Option<u32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap_or(None);
        Ok(version.unwrap_or(0))
    }
}
