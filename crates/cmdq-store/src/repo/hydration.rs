//! Hydration layer - loads command records from SQLite
//!
//! This is the one place where stored rows become typed records. Rows that do
//! not decode (unknown status, malformed photo list, bad timestamp) are
//! returned separately instead of failing the load, so nothing downstream
//! has to guard against malformed records.

use crate::errors::{from_rusqlite, Result};
use chrono::DateTime;
use cmdq_core::{CommandRecord, CommandStatus};
use rusqlite::{Connection, Row};
use std::fmt;

pub(crate) const SELECT_COLUMNS: &str = "rowid, id, text, status, created_at, audio_path, \
     transcription, photo_paths, failed, error_message, action_needed";

/// A stored row that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct RecordParseError {
    /// Command id, or `rowid:N` when the id itself is unreadable
    pub command_id: String,
    pub reason: String,
}

impl fmt::Display for RecordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command {}: {}", self.command_id, self.reason)
    }
}

/// Result of a bulk load: every decodable record plus the rows that were not
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Newest first
    pub records: Vec<CommandRecord>,
    pub errors: Vec<RecordParseError>,
}

pub(crate) fn decode_row(row: &Row<'_>) -> std::result::Result<CommandRecord, RecordParseError> {
    let rowid: i64 = row.get(0).unwrap_or_default();
    let id: String = row.get(1).map_err(|e| RecordParseError {
        command_id: format!("rowid:{}", rowid),
        reason: format!("unreadable id: {}", e),
    })?;

    let fail = |reason: String| RecordParseError {
        command_id: id.clone(),
        reason,
    };
    let column = |e: rusqlite::Error| fail(e.to_string());

    let status_raw: String = row.get(3).map_err(column)?;
    let status = status_raw
        .parse::<CommandStatus>()
        .map_err(|e| fail(e.to_string()))?;

    let created_ms: i64 = row.get(4).map_err(column)?;
    let created_at = DateTime::from_timestamp_millis(created_ms)
        .ok_or_else(|| fail(format!("created_at out of range: {}", created_ms)))?;

    let photo_json: String = row.get(7).map_err(column)?;
    let photo_paths: Vec<String> = serde_json::from_str(&photo_json)
        .map_err(|e| fail(format!("malformed photo_paths: {}", e)))?;

    Ok(CommandRecord {
        text: row.get(2).map_err(column)?,
        status,
        created_at,
        audio_path: row.get(5).map_err(column)?,
        transcription: row.get(6).map_err(column)?,
        photo_paths,
        failed: row.get(8).map_err(column)?,
        error_message: row.get(9).map_err(column)?,
        action_needed: row.get(10).map_err(column)?,
        id,
    })
}

/// Load every command, newest first
///
/// Only a failure of the query itself is an error; undecodable rows end up in
/// `LoadReport::errors` and are logged.
pub fn load_commands(conn: &Connection) -> Result<LoadReport> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM commands ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        ))
        .map_err(from_rusqlite)?;

    let decoded = stmt
        .query_map([], |row| Ok(decode_row(row)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut report = LoadReport::default();
    for item in decoded {
        match item {
            Ok(record) => report.records.push(record),
            Err(parse_error) => {
                cmdq_core::log_record_skipped!(
                    "load_commands",
                    parse_error.command_id,
                    parse_error.reason
                );
                report.errors.push(parse_error);
            }
        }
    }

    tracing::debug!(
        loaded = report.records.len(),
        skipped = report.errors.len(),
        "commands hydrated"
    );
    Ok(report)
}
