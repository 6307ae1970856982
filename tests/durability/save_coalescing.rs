//! Many fire-and-forget writes, one durable flush

use crate::common::*;

#[test]
fn hundred_inserts_then_flush_persists_all() {
    let test_db = TestDb::people();
    let people = test_db.table("people");
    for i in 0..100 {
        people
            .insert_item(&format!("p{:03}", i), json!({"age": i}))
            .unwrap();
    }

    test_db.db.flush().unwrap();

    let payload = read_json(&test_db.current_path());
    let items = stored_items(&payload, "people");
    assert_eq!(items.len(), 100);
    assert_eq!(items[99]["id"], json!("p099"));
}

#[test]
fn handle_resolution_covers_earlier_writes() {
    let test_db = TestDb::new();
    let kv = test_db.kv("kv");
    kv.set("first", json!(1)).unwrap();
    let handle = test_db.db.save();
    kv.set("second", json!(2)).unwrap();

    handle.wait().unwrap();
    assert!(handle.is_done());

    let payload = read_json(&test_db.current_path());
    let keys = payload[2][0][1].as_array().unwrap();
    assert!(keys.contains(&json!("first")));
}

#[test]
fn dropping_database_drains_queue() {
    let mut test_db = TestDb::new();
    let notes = test_db.table("notes");
    for i in 0..20 {
        notes.insert_item(&format!("n{}", i), json!({})).unwrap();
    }

    // No flush: drop must finish the queued saves.
    test_db.close();

    let payload = read_json(&test_db.current_path());
    assert_eq!(stored_items(&payload, "notes").len(), 20);
}
