//! Fatal load errors and save failure delivery

use crate::common::*;
use std::fs;

#[test]
fn foreign_file_is_a_format_mismatch() {
    let mut test_db = TestDb::new();
    test_db.close();

    // A main file written by a database with another name.
    let other = DatabaseConfig::new(test_db.dir.path(), "other");
    let other_db = Database::open(other).unwrap();
    drop(other_db);
    fs::rename(
        test_db.dir.path().join("other-current.rrdb"),
        test_db.current_path(),
    )
    .unwrap();

    let err = test_db.reopen_with(test_db.config.clone()).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch { .. }));
    assert_eq!(err.category(), coffer::ErrorCategory::Format);
}

#[test]
fn undecodable_main_is_corruption() {
    let mut test_db = TestDb::new();
    test_db.close();
    fs::write(test_db.current_path(), b"{\"truncated\": [").unwrap();

    let err = test_db.reopen_with(test_db.config.clone()).unwrap_err();
    assert!(matches!(err, Error::Corruption { .. }));
}

#[test]
fn wrong_format_version_is_rejected() {
    let mut test_db = TestDb::new();
    test_db.close();
    fs::write(
        test_db.current_path(),
        serde_json::to_vec(&json!([["test", 99], [], []])).unwrap(),
    )
    .unwrap();

    assert!(matches!(
        test_db.reopen_with(test_db.config.clone()),
        Err(Error::FormatMismatch { .. })
    ));
}

#[test]
fn duplicate_ids_in_file_are_corruption() {
    let mut test_db = TestDb::new();
    test_db.close();
    let payload = json!([
        ["test", coffer::FORMAT_VERSION],
        [["notes", [{"id": "a"}, {"id": "a"}], null]],
        []
    ]);
    fs::write(test_db.current_path(), serde_json::to_vec(&payload).unwrap()).unwrap();

    assert!(matches!(
        test_db.reopen_with(test_db.config.clone()),
        Err(Error::Corruption { .. })
    ));
}

#[test]
fn failed_save_reaches_waiters_and_worker_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let db = Database::open(DatabaseConfig::new(&data_dir, "test")).unwrap();
    let kv = db.get_or_create_kv_table("kv").unwrap();
    db.flush().unwrap();

    // Replace the data directory with a plain file so the cycle cannot write.
    fs::remove_dir_all(&data_dir).unwrap();
    fs::write(&data_dir, b"in the way").unwrap();

    kv.set("k", json!(1)).unwrap();
    let err = db.flush().unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }));
    assert!(db.stats().failures >= 1);

    // The in-memory state is untouched by the failure.
    assert_eq!(kv.get("k").unwrap(), json!(1));

    fs::remove_file(&data_dir).unwrap();
    db.flush().unwrap();
    assert!(db.files().current().exists());
}

#[test]
fn config_errors_surface_before_any_io() {
    let dir = tempfile::tempdir().unwrap();
    let err = Database::new(
        DatabaseConfig::new(dir.path(), "test").with_snapshot_interval(std::time::Duration::ZERO),
    )
    .unwrap_err();
    assert_eq!(err.category(), coffer::ErrorCategory::Config);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    assert!(matches!(
        "yaml".parse::<SaveFormat>(),
        Err(Error::Config { .. })
    ));
}
