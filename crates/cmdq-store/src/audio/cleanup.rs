//! Startup audio cleanup pass
//!
//! Three phases so the connection is only needed at the edges:
//! 1. `scan_audio_refs` reads every non-empty `audio_path`
//! 2. `plan_audio_fixes` touches the filesystem and decides each write-back
//! 3. `apply_audio_fixes` writes all decisions in one transaction
//!
//! Each write-back is guarded by the value read during the scan, so a record
//! edited in between keeps its newer value.

use crate::audio::dir::{bare_file_name, has_separator, AudioDir};
use crate::errors::{from_rusqlite, Result};
use cmdq_core::errors::{ExError, QueueError};
use cmdq_core::{log_op_end, log_op_start, log_record_skipped};
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Instant;

const OP: &str = "audio_cleanup";

/// A record's stored audio reference as read by the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    pub command_id: String,
    pub audio_path: String,
}

/// A pending write-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioFix {
    /// Replace the stored path with a bare file name
    Rewrite {
        command_id: String,
        previous: String,
        file_name: String,
    },
    /// The artifact is gone; drop the reference, keep the record
    Clear {
        command_id: String,
        previous: String,
    },
}

impl AudioFix {
    fn command_id(&self) -> &str {
        match self {
            AudioFix::Rewrite { command_id, .. } | AudioFix::Clear { command_id, .. } => {
                command_id
            }
        }
    }

    fn previous(&self) -> &str {
        match self {
            AudioFix::Rewrite { previous, .. } | AudioFix::Clear { previous, .. } => previous,
        }
    }

    fn next(&self) -> Option<&str> {
        match self {
            AudioFix::Rewrite { file_name, .. } => Some(file_name),
            AudioFix::Clear { .. } => None,
        }
    }
}

/// Outcome of one cleanup pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub scanned: usize,
    pub moved: usize,
    pub rewritten: usize,
    pub cleared: usize,
    pub skipped: usize,
    pub errors: Vec<ExError>,
}

impl CleanupReport {
    pub fn file_operations(&self) -> usize {
        self.moved
    }

    pub fn field_changes(&self) -> usize {
        self.rewritten + self.cleared
    }

    fn skip(&mut self, command_id: &str, err: ExError) {
        log_record_skipped!(OP, command_id, err);
        self.skipped += 1;
        self.errors.push(err.with_command_id(command_id.to_string()));
    }
}

/// Read every record that references an audio file
///
/// A row whose `audio_path` cannot be read as text is skipped.
pub fn scan_audio_refs(conn: &Connection, report: &mut CleanupReport) -> Result<Vec<AudioRef>> {
    let mut stmt = conn
        .prepare(
            "SELECT rowid, id, audio_path FROM commands
             WHERE audio_path IS NOT NULL AND audio_path != ''
             ORDER BY rowid",
        )
        .map_err(from_rusqlite)?;

    let rows = stmt
        .query_map([], |row| {
            let rowid: i64 = row.get(0)?;
            let id = row
                .get::<_, String>(1)
                .unwrap_or_else(|_| format!("rowid:{}", rowid));
            let path = row.get::<_, String>(2).map_err(|e| e.to_string());
            Ok((id, path))
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    let mut refs = Vec::with_capacity(rows.len());
    for (command_id, path) in rows {
        report.scanned += 1;
        match path {
            Ok(audio_path) => refs.push(AudioRef {
                command_id,
                audio_path,
            }),
            Err(reason) => {
                let err = ExError::from(QueueError::Serialization { message: reason });
                report.skip(&command_id, err);
            }
        }
    }
    Ok(refs)
}

/// Decide the write-back for each reference, moving legacy files as needed
///
/// A failed move is skipped and leaves the reference unchanged, so the next
/// pass tries again.
pub fn plan_audio_fixes(
    audio: &AudioDir,
    refs: Vec<AudioRef>,
    report: &mut CleanupReport,
) -> Vec<AudioFix> {
    let mut fixes = Vec::new();

    for AudioRef {
        command_id,
        audio_path,
    } in refs
    {
        if !has_separator(&audio_path) {
            if !audio.exists(&audio_path) {
                fixes.push(AudioFix::Clear {
                    command_id,
                    previous: audio_path,
                });
            }
            continue;
        }

        let Some(file_name) = bare_file_name(&audio_path).map(str::to_string) else {
            fixes.push(AudioFix::Clear {
                command_id,
                previous: audio_path,
            });
            continue;
        };

        let legacy = Path::new(&audio_path);
        if legacy.is_file() && !audio.exists(&file_name) {
            if let Err(err) = audio.adopt(legacy, &file_name) {
                report.skip(&command_id, err);
                continue;
            }
            report.moved += 1;
            fixes.push(AudioFix::Rewrite {
                command_id,
                previous: audio_path,
                file_name,
            });
        } else if audio.exists(&file_name) {
            fixes.push(AudioFix::Rewrite {
                command_id,
                previous: audio_path,
                file_name,
            });
        } else {
            fixes.push(AudioFix::Clear {
                command_id,
                previous: audio_path,
            });
        }
    }

    fixes
}

/// Write all fixes in a single transaction
pub fn apply_audio_fixes(
    conn: &mut Connection,
    fixes: &[AudioFix],
    report: &mut CleanupReport,
) -> Result<()> {
    if fixes.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;
    {
        let mut stmt = tx
            .prepare("UPDATE commands SET audio_path = ?1 WHERE id = ?2 AND audio_path = ?3")
            .map_err(from_rusqlite)?;

        for fix in fixes {
            match stmt.execute(params![fix.next(), fix.command_id(), fix.previous()]) {
                Ok(1) => match fix {
                    AudioFix::Rewrite { .. } => report.rewritten += 1,
                    AudioFix::Clear { .. } => report.cleared += 1,
                },
                Ok(_) => {
                    let err = ExError::from(QueueError::StoreWrite {
                        command_id: fix.command_id().to_string(),
                        reason: "audio_path changed during cleanup".to_string(),
                    });
                    report.skip(fix.command_id(), err);
                }
                Err(e) => report.skip(fix.command_id(), from_rusqlite(e)),
            }
        }
    }
    tx.commit().map_err(from_rusqlite)?;

    Ok(())
}

/// Run the whole pass against one connection
pub fn cleanup_audio_paths(conn: &mut Connection, audio: &AudioDir) -> Result<CleanupReport> {
    let start = Instant::now();
    log_op_start!(OP);

    audio.ensure()?;
    let mut report = CleanupReport::default();
    let refs = scan_audio_refs(conn, &mut report)?;
    let fixes = plan_audio_fixes(audio, refs, &mut report);
    apply_audio_fixes(conn, &fixes, &mut report)?;

    log_op_end!(
        OP,
        duration_ms = start.elapsed().as_millis() as u64,
        scanned = report.scanned,
        moved = report.moved,
        rewritten = report.rewritten,
        cleared = report.cleared,
        skipped = report.skipped,
    );
    Ok(report)
}
