//! Startup audio cleanup against a file-backed store

use cmdq_core::CommandRecord;
use cmdq_store::audio::cleanup_audio_paths;
use cmdq_store::{apply_migrations, db, load_commands, AudioDir, CommandRepo};
use rusqlite::{params, Connection};
use std::fs;
use tempfile::TempDir;

struct Fixture {
    tmp: TempDir,
    audio: AudioDir,
    conn: Connection,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let audio = AudioDir::new(tmp.path().join("audio"));
    let mut conn = db::open(tmp.path().join("commands.db")).unwrap();
    apply_migrations(&mut conn).unwrap();
    Fixture { tmp, audio, conn }
}

/// Legacy rows carry absolute paths, which the repository refuses to write
fn insert_with_path(conn: &Connection, id: &str, audio_path: &str) {
    conn.execute(
        "INSERT INTO commands (id, text, status, created_at, audio_path)
         VALUES (?1, '', 'recorded', 1000, ?2)",
        params![id, audio_path],
    )
    .unwrap();
}

#[test]
fn test_legacy_recording_is_moved_into_audio_dir() {
    let mut f = fixture();
    let legacy_dir = f.tmp.path().join("old").join("abs").join("path");
    fs::create_dir_all(&legacy_dir).unwrap();
    let legacy = legacy_dir.join("a.m4a");
    fs::write(&legacy, b"pcm").unwrap();
    insert_with_path(&f.conn, "c1", &legacy.to_string_lossy());

    let report = cleanup_audio_paths(&mut f.conn, &f.audio).unwrap();

    assert_eq!(report.moved, 1);
    assert_eq!(report.rewritten, 1);
    let record = CommandRepo::get(&f.conn, "c1").unwrap().unwrap();
    assert_eq!(record.audio_path.as_deref(), Some("a.m4a"));
    assert_eq!(fs::read(f.audio.resolve("a.m4a")).unwrap(), b"pcm");
    assert!(!legacy.exists());
}

#[test]
fn test_missing_recording_clears_path_but_keeps_record() {
    let mut f = fixture();
    insert_with_path(&f.conn, "c1", "/old/abs/path/a.m4a");
    CommandRepo::insert(&f.conn, &CommandRecord::recorded("vanished.m4a")).unwrap();

    let report = cleanup_audio_paths(&mut f.conn, &f.audio).unwrap();

    assert_eq!(report.cleared, 2);
    assert_eq!(report.file_operations(), 0);
    let loaded = load_commands(&f.conn).unwrap();
    assert_eq!(loaded.records.len(), 2);
    assert!(loaded.records.iter().all(|r| r.audio_path.is_none()));
}

#[test]
fn test_second_run_is_a_no_op() {
    let mut f = fixture();
    let legacy = f.tmp.path().join("a.m4a");
    fs::write(&legacy, b"pcm").unwrap();
    insert_with_path(&f.conn, "moved", &legacy.to_string_lossy());
    insert_with_path(&f.conn, "lost", "/nowhere/b.m4a");
    f.audio.ensure().unwrap();
    fs::write(f.audio.resolve("kept.m4a"), b"pcm").unwrap();
    CommandRepo::insert(&f.conn, &CommandRecord::recorded("kept.m4a")).unwrap();

    let first = cleanup_audio_paths(&mut f.conn, &f.audio).unwrap();
    assert_eq!(first.file_operations(), 1);
    assert_eq!(first.field_changes(), 2);

    let second = cleanup_audio_paths(&mut f.conn, &f.audio).unwrap();
    assert_eq!(second.file_operations(), 0);
    assert_eq!(second.field_changes(), 0);
    assert_eq!(second.scanned, 2);
}

#[test]
fn test_corrupt_row_does_not_stop_the_pass() {
    let mut f = fixture();
    f.conn
        .execute(
            "INSERT INTO commands (id, status, created_at, audio_path)
             VALUES ('bad', 'recorded', 1000, X'2F00FF')",
            [],
        )
        .unwrap();
    insert_with_path(&f.conn, "c1", "/old/abs/path/a.m4a");

    let report = cleanup_audio_paths(&mut f.conn, &f.audio).unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors[0].command_id(), Some("bad"));
    assert_eq!(report.cleared, 1);
}
