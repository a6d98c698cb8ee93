//! Store-side constructors for `ExError`
//!
//! Every failure leaving this crate is an `ExError`; these helpers fix the
//! kind and `op` tag per failure site so callers and tests can match on them.

use cmdq_core::errors::{ExError, ExErrorKind, QueueError};

pub type Result<T> = std::result::Result<T, ExError>;

/// A step's DDL or data transform failed; the step's transaction is rolled back
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("step {migration_id} did not apply: {reason}"))
}

pub fn checksum_mismatch(migration_id: &str, recorded: &str, shipped: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "step {migration_id} was edited after it ran (ledger {recorded}, build {shipped})"
        ))
}

/// The store was written by a newer build
pub fn unsupported_version(found: u32, supported: u32) -> ExError {
    ExError::new(ExErrorKind::UnsupportedSchemaVersion)
        .with_op("migration")
        .with_message(format!(
            "store is at schema version {found}, this build reads up to {supported}"
        ))
}

/// A single-record write the database refused
pub fn store_write(op: &str, command_id: &str, err: rusqlite::Error) -> ExError {
    let cause = QueueError::StoreWrite {
        command_id: command_id.to_string(),
        reason: err.to_string(),
    };
    ExError::from(cause).with_op(op.to_string())
}

pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

pub fn io_error(op: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_write_keeps_command_id() {
        let err = store_write(
            "add_command",
            "c-1",
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert_eq!(err.op(), Some("add_command"));
        assert!(err.to_string().contains("c-1"));
    }

    #[test]
    fn test_unsupported_version_kind() {
        let err = unsupported_version(9, 5);
        assert_eq!(err.kind(), ExErrorKind::UnsupportedSchemaVersion);
    }
}
