//! Migration runner
//!
//! Brings a store at any older version to `CURRENT_SCHEMA_VERSION`. Each step
//! runs in its own transaction together with its version bump, so a step is
//! either fully applied (minus the records it reported as skipped) or not at
//! all, and a rename is never applied twice.

use crate::errors::{from_rusqlite, migration_error, unsupported_version, Result};
use crate::migrations::checksums::{ddl_checksum, verify_recorded};
use crate::migrations::embedded::{base_schema, get_migrations, Migration};
use cmdq_core::errors::QueueError;
use rusqlite::{Connection, OptionalExtension};
use std::time::Instant;

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 5;

/// What a migration run did
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    /// Ids of the steps applied in this run, in order
    pub applied: Vec<&'static str>,
    /// Records a data transform could not process
    pub skipped: Vec<QueueError>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Current schema version of the store
pub fn schema_version(conn: &Connection) -> Result<u32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(from_rusqlite)
}

/// Apply all pending migrations to the database
pub fn apply_migrations(conn: &mut Connection) -> Result<MigrationReport> {
    let started = Instant::now();
    cmdq_core::log_op_start!("apply_migrations");

    let from_version = schema_version(conn)?;
    if from_version > CURRENT_SCHEMA_VERSION {
        let err = unsupported_version(from_version, CURRENT_SCHEMA_VERSION);
        cmdq_core::log_op_error!(
            "apply_migrations",
            err.clone(),
            duration_ms = started.elapsed().as_millis() as u64
        );
        return Err(err);
    }

    create_schema_version_table(conn)?;

    let mut report = MigrationReport {
        from_version,
        to_version: from_version,
        ..MigrationReport::default()
    };

    let base = base_schema();
    if !is_recorded(conn, base.id)? {
        apply_step(conn, &base, &mut report)?;
    }

    for migration in get_migrations() {
        if migration.version <= report.to_version {
            verify_checksum(conn, &migration)?;
            continue;
        }
        apply_step(conn, &migration, &mut report)?;
        report.to_version = migration.version;
    }

    cmdq_core::log_op_end!(
        "apply_migrations",
        duration_ms = started.elapsed().as_millis() as u64,
        schema_version = report.to_version,
        applied = report.applied.len(),
        skipped = report.skipped.len()
    );
    Ok(report)
}

/// Create the schema_version ledger if it doesn't exist
fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        [],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

fn is_recorded(conn: &Connection, migration_id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM schema_version WHERE migration_id = ?1",
            [migration_id],
            |_| Ok(()),
        )
        .optional()
        .map_err(from_rusqlite)?;
    Ok(found.is_some())
}

/// Stores upgraded by an older build have no ledger rows; only rows that
/// exist are checked.
fn verify_checksum(conn: &Connection, migration: &Migration) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?1",
            [migration.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;

    match stored {
        Some(stored) => verify_recorded(migration.id, &stored, migration.sql),
        None => Ok(()),
    }
}

/// Apply a single step: DDL, data transform, version bump, ledger row
fn apply_step(
    conn: &mut Connection,
    migration: &Migration,
    report: &mut MigrationReport,
) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;

    if let Some(transform) = migration.transform {
        let skipped = transform(&tx, migration.version)?;
        report.skipped.extend(skipped);
    }

    if migration.version > 0 {
        tx.pragma_update(None, "user_version", migration.version)
            .map_err(from_rusqlite)?;
    }

    tx.execute(
        "INSERT OR REPLACE INTO schema_version (version, migration_id, applied_at, checksum)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            migration.version,
            migration.id,
            chrono::Utc::now().timestamp(),
            ddl_checksum(migration.sql)
        ],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;

    tracing::info!(
        migration_id = migration.id,
        schema_version = migration.version,
        "migration step applied"
    );
    report.applied.push(migration.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_migrations() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = apply_migrations(&mut conn).unwrap();
        assert_eq!(report.from_version, 0);
        assert_eq!(report.to_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(report.applied.len(), 6);
    }

    #[test]
    fn test_idempotency() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        let report = apply_migrations(&mut conn).unwrap();
        assert!(report.is_noop());
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_store_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();
        let err = apply_migrations(&mut conn).unwrap_err();
        assert_eq!(
            err.kind(),
            cmdq_core::ExErrorKind::UnsupportedSchemaVersion
        );
    }
}
