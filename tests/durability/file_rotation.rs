//! Rotation, load fallback and dated snapshots

use crate::common::*;
use std::fs;
use std::thread;
use std::time::Duration;

#[test]
fn second_save_rotates_previous_main() {
    let mut test_db = TestDb::new();
    let kv = test_db.kv("kv");
    kv.set("v", json!(1)).unwrap();
    test_db.db.flush().unwrap();
    kv.set("v", json!(2)).unwrap();
    // One queued request, drained by exactly one cycle.
    test_db.close();

    let recent = read_json(&test_db.recent_path());
    assert_eq!(recent[2][0][2], json!([1]));
    let current = read_json(&test_db.current_path());
    assert_eq!(current[2][0][2], json!([2]));
    assert!(!test_db.temp_path().exists());
}

#[test]
fn empty_main_falls_back_to_temp() {
    let mut test_db = TestDb::new();
    test_db.kv("kv").set("from", json!("temp")).unwrap();
    test_db.db.flush().unwrap();
    test_db.close();

    // Interrupted cycle: temp written, main truncated.
    fs::copy(test_db.current_path(), test_db.temp_path()).unwrap();
    fs::write(test_db.current_path(), b"").unwrap();

    test_db.reopen_with(test_db.config.clone()).unwrap();
    assert_eq!(
        test_db.db.kv_table("kv").unwrap().get("from").unwrap(),
        json!("temp")
    );
}

#[test]
fn missing_main_and_temp_fall_back_to_recent() {
    let mut test_db = TestDb::new();
    test_db.kv("kv").set("v", json!("old")).unwrap();
    test_db.reopen();
    test_db.db.kv_table("kv").unwrap().set("v", json!("new")).unwrap();
    test_db.close();

    fs::remove_file(test_db.current_path()).unwrap();

    test_db.reopen_with(test_db.config.clone()).unwrap();
    assert_eq!(
        test_db.db.kv_table("kv").unwrap().get("v").unwrap(),
        json!("old")
    );
}

#[test]
fn no_files_starts_empty_and_saves() {
    let test_db = TestDb::new();
    assert!(test_db.current_path().exists());
    assert!(test_db.db.table_labels().is_empty());

    let payload = read_json(&test_db.current_path());
    assert_eq!(payload, json!([["test", coffer::FORMAT_VERSION], [], []]));
}

#[test]
fn snapshots_follow_interval() {
    let mut test_db = TestDb::with_config(|config| {
        config.with_snapshot_interval(Duration::from_millis(50))
    });
    let kv = test_db.kv("kv");
    kv.set("v", json!(1)).unwrap();
    test_db.db.flush().unwrap();

    thread::sleep(Duration::from_millis(150));
    kv.set("v", json!(2)).unwrap();
    test_db.db.flush().unwrap();

    let snapshots = test_db.db.files().list_snapshots().unwrap();
    assert_eq!(snapshots.len(), 1);
    let name = snapshots[0].1.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("test_"), "{}", name);
    assert!(name.ends_with(".rrdb"), "{}", name);
    assert_eq!(read_json(&snapshots[0].1)[2][0][2], json!([1]));

    // Main was just rewritten, so an immediate save takes no snapshot.
    kv.set("v", json!(3)).unwrap();
    test_db.db.flush().unwrap();
    assert_eq!(test_db.db.files().list_snapshots().unwrap().len(), 1);

    // The last snapshot time survives a restart.
    test_db.reopen();
    test_db.kv("kv").set("v", json!(4)).unwrap();
    test_db.db.flush().unwrap();
    assert_eq!(test_db.db.files().list_snapshots().unwrap().len(), 1);
}
