//! Per-record data transforms run by migration steps
//!
//! A row that cannot be read or rewritten is skipped and reported; the rest of
//! the step still commits.

use crate::errors::{from_rusqlite, Result};
use cmdq_core::errors::QueueError;
use cmdq_core::log_record_skipped;
use cmdq_core::CommandStatus;
use rusqlite::{params, Transaction};

/// A data transform: returns the records it had to skip
pub type Transform = fn(&Transaction<'_>, u32) -> Result<Vec<QueueError>>;

/// Status values written before v2, and their replacements
const LEGACY_STATUS_RENAMES: [(&str, CommandStatus); 2] = [
    ("pending", CommandStatus::Queued),
    ("transcribed", CommandStatus::ManualReview),
];

/// Status value written before the failure flag existed
const LEGACY_FAILED_STATUS: &str = "failed";
const LEGACY_FAILED_MESSAGE: &str = "Failed before upgrade";

struct StatusRow {
    rowid: i64,
    id: String,
    status: std::result::Result<String, String>,
}

/// Read every row's status without letting one bad row stop the scan
fn scan_statuses(tx: &Transaction<'_>) -> Result<Vec<StatusRow>> {
    let mut stmt = tx
        .prepare("SELECT rowid, id, status FROM commands ORDER BY rowid")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            let rowid: i64 = row.get(0)?;
            let id = row
                .get::<_, String>(1)
                .unwrap_or_else(|_| format!("rowid:{}", rowid));
            let status = row.get::<_, String>(2).map_err(|e| e.to_string());
            Ok(StatusRow { rowid, id, status })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

fn skip(op: &str, version: u32, id: &str, reason: String) -> QueueError {
    log_record_skipped!(op, id, reason);
    QueueError::MigrationRecord {
        version,
        command_id: id.to_string(),
        reason,
    }
}

/// v2: rename `pending` and `transcribed` to their current names
pub fn rename_legacy_statuses(tx: &Transaction<'_>, version: u32) -> Result<Vec<QueueError>> {
    let mut skipped = Vec::new();

    for row in scan_statuses(tx)? {
        let status = match row.status {
            Ok(status) => status,
            Err(reason) => {
                skipped.push(skip("migrate_status_renames", version, &row.id, reason));
                continue;
            }
        };
        let Some((_, renamed)) = LEGACY_STATUS_RENAMES
            .iter()
            .find(|(legacy, _)| *legacy == status)
        else {
            continue;
        };

        if let Err(e) = tx.execute(
            "UPDATE commands SET status = ?1 WHERE rowid = ?2",
            params![renamed.as_str(), row.rowid],
        ) {
            skipped.push(skip(
                "migrate_status_renames",
                version,
                &row.id,
                e.to_string(),
            ));
        }
    }

    Ok(skipped)
}

/// v4: a legacy `failed` status becomes `processing` with the failure flag set
pub fn split_legacy_failed_status(
    tx: &Transaction<'_>,
    version: u32,
) -> Result<Vec<QueueError>> {
    let mut skipped = Vec::new();

    for row in scan_statuses(tx)? {
        match row.status {
            Ok(status) if status == LEGACY_FAILED_STATUS => {
                if let Err(e) = tx.execute(
                    "UPDATE commands
                     SET status = ?1, failed = 1, error_message = COALESCE(error_message, ?2)
                     WHERE rowid = ?3",
                    params![
                        CommandStatus::Processing.as_str(),
                        LEGACY_FAILED_MESSAGE,
                        row.rowid
                    ],
                ) {
                    skipped.push(skip("migrate_failed_flag", version, &row.id, e.to_string()));
                }
            }
            Ok(_) => {}
            Err(reason) => {
                skipped.push(skip("migrate_failed_flag", version, &row.id, reason));
            }
        }
    }

    Ok(skipped)
}
