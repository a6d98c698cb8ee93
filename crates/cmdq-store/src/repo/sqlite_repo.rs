//! SQLite repository implementation
//!
//! Single-record CRUD. Every write is one statement, so a rejected write
//! leaves the row exactly as it was.

use crate::errors::{from_rusqlite, store_write, Result};
use crate::repo::hydration::{decode_row, SELECT_COLUMNS};
use cmdq_core::errors::{ExError, QueueError};
use cmdq_core::{CommandPatch, CommandRecord};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};

/// SQLite repository for command records
pub struct CommandRepo;

impl CommandRepo {
    /// Insert a new command
    ///
    /// Fails with `AlreadyExists` when the id is taken and with `InvalidInput`
    /// when the record breaks a record-level invariant.
    pub fn insert(conn: &Connection, record: &CommandRecord) -> Result<()> {
        record.validate().map_err(ExError::from)?;

        if Self::exists(conn, &record.id)? {
            return Err(QueueError::DuplicateId {
                command_id: record.id.clone(),
            }
            .into());
        }

        let photo_paths = encode_photo_paths(&record.photo_paths)?;
        conn.execute(
            "INSERT INTO commands (id, text, status, created_at, audio_path, transcription,
                                   photo_paths, failed, error_message, action_needed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                record.id,
                record.text,
                record.status.as_str(),
                record.created_at.timestamp_millis(),
                record.audio_path,
                record.transcription,
                photo_paths,
                record.failed,
                record.error_message,
                record.action_needed,
            ],
        )
        .map_err(|e| store_write("insert_command", &record.id, e))?;

        Ok(())
    }

    /// Get a command by ID
    ///
    /// A row that exists but cannot be decoded is reported as an error.
    pub fn get(conn: &Connection, command_id: &str) -> Result<Option<CommandRecord>> {
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM commands WHERE id = ?1", SELECT_COLUMNS))
            .map_err(from_rusqlite)?;

        let decoded = stmt
            .query_row([command_id], |row| Ok(decode_row(row)))
            .optional()
            .map_err(from_rusqlite)?;

        match decoded {
            None => Ok(None),
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(parse_error)) => Err(QueueError::Serialization {
                message: parse_error.to_string(),
            }
            .into()),
        }
    }

    pub fn exists(conn: &Connection, command_id: &str) -> Result<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM commands WHERE id = ?1",
                [command_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(from_rusqlite)?;
        Ok(found.is_some())
    }

    /// Write the fields named in `patch`
    ///
    /// Returns `false` when no row has this id. An empty patch touches nothing.
    pub fn update(conn: &Connection, command_id: &str, patch: &CommandPatch) -> Result<bool> {
        if patch.is_empty() {
            return Self::exists(conn, command_id);
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(text) = &patch.text {
            assignments.push("text");
            values.push(Box::new(text.clone()));
        }
        if let Some(status) = patch.status {
            assignments.push("status");
            values.push(Box::new(status.as_str()));
        }
        if let Some(audio_path) = &patch.audio_path {
            assignments.push("audio_path");
            values.push(Box::new(audio_path.clone()));
        }
        if let Some(transcription) = &patch.transcription {
            assignments.push("transcription");
            values.push(Box::new(transcription.clone()));
        }
        if let Some(failed) = patch.failed {
            assignments.push("failed");
            values.push(Box::new(failed));
        }
        if let Some(action_needed) = patch.action_needed {
            assignments.push("action_needed");
            values.push(Box::new(action_needed));
        }
        if let Some(error_message) = &patch.error_message {
            assignments.push("error_message");
            values.push(Box::new(error_message.clone()));
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE commands SET {} WHERE id = ?{}",
            set_clause,
            values.len() + 1
        );
        values.push(Box::new(command_id.to_string()));

        let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let changed = conn
            .execute(&sql, params.as_slice())
            .map_err(|e| store_write("update_command", command_id, e))?;

        Ok(changed > 0)
    }

    /// Delete a command row
    ///
    /// Returns `false` when no row has this id.
    pub fn delete(conn: &Connection, command_id: &str) -> Result<bool> {
        let changed = conn
            .execute("DELETE FROM commands WHERE id = ?1", [command_id])
            .map_err(|e| store_write("delete_command", command_id, e))?;
        Ok(changed > 0)
    }
}

fn encode_photo_paths(photo_paths: &[String]) -> Result<String> {
    serde_json::to_string(photo_paths).map_err(|e| {
        QueueError::Serialization {
            message: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::apply_migrations;
    use cmdq_core::{CommandStatus, ExErrorKind};

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup();
        let record = CommandRecord::recorded("a.m4a").with_photos(vec!["p.jpg".to_string()]);
        CommandRepo::insert(&conn, &record).unwrap();

        let loaded = CommandRepo::get(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let conn = setup();
        let record = CommandRecord::text("x");
        CommandRepo::insert(&conn, &record).unwrap();
        let err = CommandRepo::insert(&conn, &record).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::AlreadyExists);
    }

    #[test]
    fn test_insert_rejects_absolute_audio_path() {
        let conn = setup();
        let mut record = CommandRecord::recorded("a.m4a");
        record.audio_path = Some("/tmp/a.m4a".to_string());
        let err = CommandRepo::insert(&conn, &record).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
        assert!(!CommandRepo::exists(&conn, &record.id).unwrap());
    }

    #[test]
    fn test_update_patch() {
        let conn = setup();
        let record = CommandRecord::recorded("a.m4a");
        CommandRepo::insert(&conn, &record).unwrap();

        let mut patch = CommandPatch::status(CommandStatus::Transcribing);
        patch.failed = Some(true);
        patch.error_message = Some(Some("API timeout".to_string()));
        assert!(CommandRepo::update(&conn, &record.id, &patch).unwrap());

        let loaded = CommandRepo::get(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.status, CommandStatus::Transcribing);
        assert!(loaded.failed);
        assert_eq!(loaded.error_message.as_deref(), Some("API timeout"));
        assert_eq!(loaded.audio_path.as_deref(), Some("a.m4a"));
    }

    #[test]
    fn test_update_missing_returns_false() {
        let conn = setup();
        let patch = CommandPatch::status(CommandStatus::Queued);
        assert!(!CommandRepo::update(&conn, "nope", &patch).unwrap());
    }

    #[test]
    fn test_delete() {
        let conn = setup();
        let record = CommandRecord::text("x");
        CommandRepo::insert(&conn, &record).unwrap();
        assert!(CommandRepo::delete(&conn, &record.id).unwrap());
        assert!(!CommandRepo::delete(&conn, &record.id).unwrap());
        assert!(CommandRepo::get(&conn, &record.id).unwrap().is_none());
    }

    #[test]
    fn test_rejected_write_surfaces_as_persistence_error() {
        let conn = setup();
        let record = CommandRecord::text("x");
        CommandRepo::insert(&conn, &record).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_updates BEFORE UPDATE ON commands
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        let err = CommandRepo::update(&conn, &record.id, &CommandPatch::status(CommandStatus::Processing))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
        assert_eq!(err.op(), Some("update_command"));
        let loaded = CommandRepo::get(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded.status, CommandStatus::Queued);
    }
}
