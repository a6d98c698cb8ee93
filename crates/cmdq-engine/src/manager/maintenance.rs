//! Startup maintenance
//!
//! Runs the audio cleanup pass and then replaces the whole cache with a fresh
//! load. The connection is held to scan and to write back, not while files
//! are being moved.

use super::QueueManager;
use cmdq_core::{log_op_end, log_op_start};
use cmdq_store::audio::{apply_audio_fixes, plan_audio_fixes, scan_audio_refs};
use cmdq_store::errors::{io_error, Result};
use cmdq_store::{load_commands, CleanupReport, RecordParseError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct MaintenanceReport {
    pub cleanup: CleanupReport,
    /// Records in the cache after the swap
    pub loaded: usize,
    pub load_errors: Vec<RecordParseError>,
}

impl QueueManager {
    /// Run maintenance on the calling thread
    pub fn run_maintenance(&self) -> Result<MaintenanceReport> {
        let started = Instant::now();
        log_op_start!("queue_maintenance");

        self.audio.ensure()?;
        let mut cleanup = CleanupReport::default();

        let refs = {
            let conn = self.lock_conn();
            scan_audio_refs(&conn, &mut cleanup)?
        };
        let fixes = plan_audio_fixes(&self.audio, refs, &mut cleanup);

        let mut conn = self.lock_conn();
        apply_audio_fixes(&mut conn, &fixes, &mut cleanup)?;
        let loaded = load_commands(&conn)?;
        let count = loaded.records.len();
        *self.write_cache() = loaded.records;
        drop(conn);

        log_op_end!(
            "queue_maintenance",
            duration_ms = started.elapsed().as_millis() as u64,
            moved = cleanup.moved,
            field_changes = cleanup.field_changes(),
            skipped = cleanup.skipped,
            loaded = count
        );

        Ok(MaintenanceReport {
            cleanup,
            loaded: count,
            load_errors: loaded.errors,
        })
    }

    /// Run maintenance on a background thread
    ///
    /// Reads keep serving the current cache until the swap at the end.
    pub fn spawn_maintenance(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<MaintenanceReport>>> {
        let manager = Arc::clone(self);
        thread::Builder::new()
            .name("cmdq-maintenance".to_string())
            .spawn(move || {
                manager.run_maintenance().inspect_err(|err| {
                    tracing::error!(
                        op = "queue_maintenance",
                        err.code = err.code(),
                        error = %err,
                        "maintenance pass failed"
                    );
                })
            })
            .map_err(|e| io_error("spawn_maintenance", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdq_store::AudioDir;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_recording_cleared_in_cache() {
        let tmp = TempDir::new().unwrap();
        let audio = AudioDir::new(tmp.path().join("audio"));
        let manager = QueueManager::open_in_memory(audio.clone()).unwrap();

        let source = tmp.path().join("take1.m4a");
        fs::write(&source, b"pcm").unwrap();
        let record = manager.add_recorded("", &source, vec![]).unwrap();
        fs::remove_file(audio.resolve("take1.m4a")).unwrap();

        let report = manager.run_maintenance().unwrap();

        assert_eq!(report.cleanup.cleared, 1);
        assert_eq!(report.loaded, 1);
        let reloaded = manager.get(&record.id).unwrap();
        assert_eq!(reloaded.audio_path, None);
        assert_eq!(reloaded.status, record.status);
    }
}
