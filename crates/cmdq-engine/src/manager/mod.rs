//! Queue manager
//!
//! Keeps an in-memory list mirroring the store. Every mutation writes to the
//! store first and touches the list only once that write succeeded, so a
//! rejected write leaves both exactly as they were.
//!
//! Lock order is connection, then cache. Readers only take the cache lock.

mod maintenance;

pub use maintenance::MaintenanceReport;

use crate::config::QueueConfig;
use cmdq_core::errors::{ExError, QueueError};
use cmdq_core::{
    can_retry, log_op_end, log_op_error, log_op_start, retry_policy, CommandPatch, CommandRecord,
    CommandStatus, QueueView, DEFAULT_VIEW_LIMIT,
};
use cmdq_store::errors::{from_rusqlite, io_error, Result};
use cmdq_store::{apply_migrations, db, load_commands, AudioDir, CommandRepo};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

pub struct QueueManager {
    conn: Mutex<Connection>,
    cache: RwLock<Vec<CommandRecord>>,
    audio: AudioDir,
    view_limit: usize,
}

impl QueueManager {
    /// Open the store under `config.data_root`, migrate it and load every record
    ///
    /// The audio cleanup pass is not run here; see `run_maintenance` and
    /// `spawn_maintenance`.
    pub fn init(config: &QueueConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_root).map_err(|e| io_error("create_data_root", e))?;

        let audio = AudioDir::new(config.audio_dir());
        audio.ensure()?;
        let conn = db::open(config.database_path())?;

        Self::from_connection(conn, audio, config.view_limit)
    }

    /// In-memory store; audio files still live in `audio`
    pub fn open_in_memory(audio: AudioDir) -> Result<Self> {
        audio.ensure()?;
        Self::from_connection(db::open_in_memory()?, audio, DEFAULT_VIEW_LIMIT)
    }

    fn from_connection(mut conn: Connection, audio: AudioDir, view_limit: usize) -> Result<Self> {
        let started = Instant::now();
        log_op_start!("queue_init");

        let migration = apply_migrations(&mut conn)?;
        let loaded = load_commands(&conn)?;

        log_op_end!(
            "queue_init",
            duration_ms = started.elapsed().as_millis() as u64,
            schema_version = migration.to_version,
            migration_skipped = migration.skipped.len(),
            loaded = loaded.records.len(),
            skipped = loaded.errors.len()
        );

        Ok(Self {
            conn: Mutex::new(conn),
            cache: RwLock::new(loaded.records),
            audio,
            view_limit,
        })
    }

    /// Close the store connection
    pub fn dispose(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, e)| from_rusqlite(e))?;
        tracing::info!(op = "queue_dispose", "store connection closed");
        Ok(())
    }

    pub fn audio_dir(&self) -> &AudioDir {
        &self.audio
    }

    // ===== Mutations =====

    /// Insert a new record
    pub fn add(&self, record: CommandRecord) -> Result<CommandRecord> {
        let started = Instant::now();
        log_op_start!("add_command", command_id = %record.id);

        let conn = self.lock_conn();
        if let Err(err) = CommandRepo::insert(&conn, &record) {
            log_op_error!(
                "add_command",
                err.clone(),
                duration_ms = started.elapsed().as_millis() as u64
            );
            return Err(err);
        }
        self.write_cache().insert(0, record.clone());
        drop(conn);

        log_op_end!(
            "add_command",
            duration_ms = started.elapsed().as_millis() as u64,
            command_id = %record.id,
            status = record.status.as_str()
        );
        Ok(record)
    }

    /// Add a command captured as audio
    ///
    /// The recording at `audio_source` is moved into the audio directory
    /// first; if the insert is then rejected the moved file is removed again.
    pub fn add_recorded(
        &self,
        text: impl Into<String>,
        audio_source: &Path,
        photo_paths: Vec<String>,
    ) -> Result<CommandRecord> {
        let file_name = self.audio.import(audio_source)?;
        let mut record = CommandRecord::recorded(file_name.clone()).with_photos(photo_paths);
        record.text = text.into();

        self.add(record).inspect_err(|_| {
            if let Err(cleanup) = self.audio.delete(&file_name) {
                tracing::warn!(
                    op = "add_command",
                    audio_path = %file_name,
                    error = %cleanup,
                    "could not remove imported recording"
                );
            }
        })
    }

    /// Add a typed command; it starts out `queued`
    pub fn add_text(
        &self,
        text: impl Into<String>,
        photo_paths: Vec<String>,
    ) -> Result<CommandRecord> {
        self.add(CommandRecord::text(text).with_photos(photo_paths))
    }

    /// Move a command to `status` along a legal lifecycle edge
    ///
    /// # Errors
    ///
    /// `IllegalTransition` when the edge does not exist, or a store error.
    pub fn update_status(&self, id: &str, status: CommandStatus) -> Result<Option<CommandRecord>> {
        self.apply_patch("update_status", id, CommandPatch::status(status))
    }

    pub fn update_text(&self, id: &str, text: impl Into<String>) -> Result<Option<CommandRecord>> {
        let patch = CommandPatch {
            text: Some(text.into()),
            ..CommandPatch::default()
        };
        self.apply_patch("update_text", id, patch)
    }

    pub fn update_transcription(
        &self,
        id: &str,
        transcription: Option<String>,
    ) -> Result<Option<CommandRecord>> {
        let patch = CommandPatch {
            transcription: Some(transcription),
            ..CommandPatch::default()
        };
        self.apply_patch("update_transcription", id, patch)
    }

    /// Point the record at another file in the audio directory, or at none
    pub fn update_audio_path(
        &self,
        id: &str,
        audio_path: Option<String>,
    ) -> Result<Option<CommandRecord>> {
        let patch = CommandPatch {
            audio_path: Some(audio_path),
            ..CommandPatch::default()
        };
        self.apply_patch("update_audio_path", id, patch)
    }

    /// Set or clear the failure flag
    ///
    /// Clearing always drops the message; setting requires one.
    pub fn update_failed(
        &self,
        id: &str,
        failed: bool,
        message: Option<String>,
    ) -> Result<Option<CommandRecord>> {
        let patch = if failed {
            match message {
                Some(message) => CommandPatch::failure(message),
                None => {
                    return Err(QueueError::MissingErrorMessage {
                        command_id: id.to_string(),
                    }
                    .into())
                }
            }
        } else {
            CommandPatch::clear_failure()
        };
        self.apply_patch("update_failed", id, patch)
    }

    /// Replace the diagnostic; a failed record cannot lose its message
    pub fn update_error_message(
        &self,
        id: &str,
        message: Option<String>,
    ) -> Result<Option<CommandRecord>> {
        let patch = CommandPatch {
            error_message: Some(message),
            ..CommandPatch::default()
        };
        self.apply_patch("update_error_message", id, patch)
    }

    pub fn update_action_needed(
        &self,
        id: &str,
        action_needed: bool,
    ) -> Result<Option<CommandRecord>> {
        let patch = CommandPatch {
            action_needed: Some(action_needed),
            ..CommandPatch::default()
        };
        self.apply_patch("update_action_needed", id, patch)
    }

    /// User-initiated retry
    ///
    /// # Errors
    ///
    /// `RetryUnavailable` when the current `(status, failed)` offers no retry.
    pub fn retry(&self, id: &str) -> Result<Option<CommandRecord>> {
        self.mutate("retry", id, |current| {
            if !can_retry(current.status, current.failed) {
                return Err(QueueError::RetryUnavailable {
                    command_id: current.id.clone(),
                    status: current.status.to_string(),
                    failed: current.failed,
                }
                .into());
            }
            Ok(retry_policy(current.status, current.failed).to_patch())
        })
    }

    /// Delete a record and its audio file
    ///
    /// Returns `false` when no record has this id. A recording that cannot be
    /// deleted is logged and left behind; the record is still gone.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let started = Instant::now();
        log_op_start!("remove_command", command_id = id);

        let conn = self.lock_conn();
        let deleted = match CommandRepo::delete(&conn, id) {
            Ok(deleted) => deleted,
            Err(err) => {
                log_op_error!(
                    "remove_command",
                    err.clone(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    command_id = id
                );
                return Err(err);
            }
        };

        let removed = {
            let mut cache = self.write_cache();
            let position = cache.iter().position(|r| r.id == id);
            position.map(|index| cache.remove(index))
        };
        drop(conn);

        if !deleted {
            log_not_found("remove_command", id);
            return Ok(false);
        }

        if let Some(stored) = removed.as_ref().and_then(|r| r.audio_path.as_deref()) {
            if let Err(err) = self.audio.delete_stored(stored) {
                tracing::warn!(
                    op = "remove_command",
                    command_id = id,
                    audio_path = stored,
                    error = %err,
                    "recording left behind"
                );
            }
        }

        log_op_end!(
            "remove_command",
            duration_ms = started.elapsed().as_millis() as u64,
            command_id = id
        );
        Ok(true)
    }

    /// Apply `patch`, checking the status edge when it moves the status
    pub(crate) fn apply_patch(
        &self,
        op: &'static str,
        id: &str,
        patch: CommandPatch,
    ) -> Result<Option<CommandRecord>> {
        self.mutate(op, id, move |current| {
            if let Some(next) = patch.status {
                if !current.status.can_transition_to(next) {
                    return Err(QueueError::IllegalTransition {
                        command_id: current.id.clone(),
                        from: current.status.to_string(),
                        to: next.to_string(),
                    }
                    .into());
                }
            }
            Ok(patch)
        })
    }

    /// Single-record write-then-cache-update
    ///
    /// `build` sees the cached record and returns the patch to write. The
    /// fields the patch writes must validate before anything is written.
    fn mutate<F>(&self, op: &'static str, id: &str, build: F) -> Result<Option<CommandRecord>>
    where
        F: FnOnce(&CommandRecord) -> Result<CommandPatch>,
    {
        let started = Instant::now();
        log_op_start!(op, command_id = id);

        let conn = self.lock_conn();
        let Some(current) = self.get(id) else {
            log_not_found(op, id);
            return Ok(None);
        };

        let written = build(&current).and_then(|patch| {
            let mut updated = current.clone();
            updated.apply(&patch);
            patch.validate_on(&updated).map_err(ExError::from)?;
            let found = CommandRepo::update(&conn, id, &patch)?;
            Ok(found.then_some(updated))
        });

        let updated = match written {
            Ok(updated) => updated,
            Err(err) => {
                log_op_error!(
                    op,
                    err.clone(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    command_id = id
                );
                return Err(err);
            }
        };

        let mut cache = self.write_cache();
        let Some(updated) = updated else {
            // Cached but gone from the store
            cache.retain(|r| r.id != id);
            drop(cache);
            log_not_found(op, id);
            return Ok(None);
        };
        if let Some(slot) = cache.iter_mut().find(|r| r.id == id) {
            *slot = updated.clone();
        }
        drop(cache);
        drop(conn);

        log_op_end!(
            op,
            duration_ms = started.elapsed().as_millis() as u64,
            command_id = id,
            status = updated.status.as_str(),
            failed = updated.failed
        );
        Ok(Some(updated))
    }

    // ===== Reads =====

    pub fn get(&self, id: &str) -> Option<CommandRecord> {
        self.read_cache().iter().find(|r| r.id == id).cloned()
    }

    /// Every cached record, newest first as loaded
    pub fn snapshot(&self) -> Vec<CommandRecord> {
        self.read_cache().clone()
    }

    pub fn view(&self, view: QueueView) -> Vec<CommandRecord> {
        view.project(&self.read_cache(), self.view_limit)
    }

    /// Work still moving through the pipeline without trouble
    pub fn processing_view(&self) -> Vec<CommandRecord> {
        self.view(QueueView::Processing)
    }

    pub fn completed_view(&self) -> Vec<CommandRecord> {
        self.view(QueueView::Completed)
    }

    /// Failed, flagged, or awaiting confirmation
    pub fn review_view(&self) -> Vec<CommandRecord> {
        self.view(QueueView::Review)
    }

    pub fn all_view(&self) -> Vec<CommandRecord> {
        self.view(QueueView::All)
    }

    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_cache().is_empty()
    }

    // ===== Locks =====

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Vec<CommandRecord>> {
        self.cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Vec<CommandRecord>> {
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_not_found(op: &str, id: &str) {
    let err = ExError::from(QueueError::RecordNotFound {
        command_id: id.to_string(),
    });
    tracing::warn!(
        op,
        command_id = id,
        err.code = err.code(),
        "no such command; nothing changed"
    );
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("audio", &self.audio)
            .field("records", &self.len())
            .field("view_limit", &self.view_limit)
            .finish()
    }
}
