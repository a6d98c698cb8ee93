//! Records written through the repository survive a reopen

use cmdq_core::{CommandPatch, CommandRecord, CommandStatus};
use cmdq_store::{apply_migrations, db, load_commands, CommandRepo};
use tempfile::TempDir;

#[test]
fn test_records_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("commands.db");

    let recorded = CommandRecord::recorded("voice.m4a");
    let typed = CommandRecord::text("turn on the lights")
        .with_photos(vec!["p1.jpg".to_string(), "p0.jpg".to_string()]);
    let removed = CommandRecord::text("never mind");

    {
        let mut conn = db::open(&path).unwrap();
        apply_migrations(&mut conn).unwrap();
        CommandRepo::insert(&conn, &recorded).unwrap();
        CommandRepo::insert(&conn, &typed).unwrap();
        CommandRepo::insert(&conn, &removed).unwrap();

        CommandRepo::update(&conn, &typed.id, &CommandPatch::failure("executor offline")).unwrap();
        CommandRepo::delete(&conn, &removed.id).unwrap();
    }

    let mut conn = db::open(&path).unwrap();
    assert!(apply_migrations(&mut conn).unwrap().is_noop());
    let loaded = load_commands(&conn).unwrap();

    assert!(loaded.errors.is_empty());
    assert_eq!(loaded.records.len(), 2);
    assert!(loaded.records.iter().all(|r| r.id != removed.id));

    let typed_back = loaded.records.iter().find(|r| r.id == typed.id).unwrap();
    assert_eq!(typed_back.status, CommandStatus::Queued);
    assert_eq!(typed_back.photo_paths, vec!["p1.jpg", "p0.jpg"]);
    assert!(typed_back.failed);
    assert_eq!(typed_back.error_message.as_deref(), Some("executor offline"));
    assert_eq!(typed_back.created_at, typed.created_at);

    let recorded_back = CommandRepo::get(&conn, &recorded.id).unwrap().unwrap();
    assert_eq!(recorded_back, recorded);
}
