//! Table and KV table behavior through the public API

use crate::common::*;

#[test]
fn insert_then_fetch_returns_defaults_filled_item() {
    let test_db = TestDb::people();
    let people = test_db.table("people");

    people.insert_item("amy", json!({"name": "amy"})).unwrap();

    let amy = people.fetch_item("amy").unwrap();
    assert_eq!(
        amy.to_value(),
        json!({"id": "amy", "name": "amy", "age": 0.0, "active": true, "tags": []})
    );
}

#[test]
fn duplicate_insert_leaves_count_unchanged() {
    let test_db = TestDb::people();
    let people = test_db.table("people");
    people.insert_item("amy", json!({})).unwrap();

    let err = people.insert_item("amy", json!({})).unwrap_err();
    assert!(matches!(err, Error::DuplicateId { .. }));
    assert_eq!(err.category(), coffer::ErrorCategory::Identity);
    assert_eq!(people.len().unwrap(), 1);
}

#[test]
fn merge_preserves_other_fields() {
    let test_db = TestDb::people();
    let people = test_db.table("people");
    people
        .insert_item("bob", json!({"name": "bob", "age": 31, "tags": ["x"]}))
        .unwrap();

    people.merge_item_by_id("bob", json!({"active": false})).unwrap();

    let bob = people.fetch_item("bob").unwrap();
    assert_eq!(bob.get("name"), Some(&json!("bob")));
    assert_eq!(bob.get("age"), Some(&json!(31)));
    assert_eq!(bob.get("tags"), Some(&json!(["x"])));
    assert_eq!(bob.get("active"), Some(&json!(false)));
}

#[test]
fn merge_revalidates_result() {
    let test_db = TestDb::people();
    let people = test_db.table("people");
    people.insert_item("bob", json!({})).unwrap();

    assert!(matches!(
        people.merge_item_by_id("bob", json!({"tags": ["ok", 3]})),
        Err(Error::SchemaMismatch { .. })
    ));
    assert_eq!(people.fetch_item("bob").unwrap().get("tags"), Some(&json!([])));
}

#[test]
fn remove_then_fetch_is_not_found() {
    let test_db = TestDb::people();
    let people = test_db.table("people");
    people.insert_item("cid", json!({})).unwrap();

    people.remove_item_by_id("cid").unwrap();

    assert!(matches!(
        people.fetch_item("cid"),
        Err(Error::ItemNotFound { .. })
    ));
    assert!(!people.has_item("cid").unwrap());
}

#[test]
fn handles_share_contents() {
    let test_db = TestDb::new();
    let a = test_db.table("notes");
    let b = test_db.db.table("notes").unwrap();

    a.insert_item("n1", json!({"text": "hi"})).unwrap();
    assert_eq!(b.ids().unwrap(), vec!["n1".to_string()]);
}

#[test]
fn items_iterate_in_id_order() {
    let test_db = TestDb::new();
    let notes = test_db.table("notes");
    for id in ["c", "a", "b"] {
        notes.insert_item(id, json!({})).unwrap();
    }
    let ids: Vec<_> = notes
        .items()
        .unwrap()
        .iter()
        .map(|i| i.id().to_string())
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[test]
fn non_finite_numbers_cannot_be_built() {
    assert!(matches!(
        coffer::number(f64::NAN),
        Err(Error::InvalidValue { .. })
    ));
    assert!(coffer::number(f64::INFINITY).is_err());
    assert_eq!(coffer::number(1.5).unwrap(), json!(1.5));
}

#[test]
fn schemaless_update_keeps_nested_values() {
    let test_db = TestDb::new();
    let notes = test_db.table("notes");
    let mut item = notes.insert_item_cloned("n", json!({"v": 1})).unwrap();
    item.set("v", json!({"deep": [1, 2]})).unwrap();
    notes.update_item(item).unwrap();
    assert_eq!(
        notes.fetch_item("n").unwrap().get("v"),
        Some(&json!({"deep": [1, 2]}))
    );
}

#[test]
fn destroyed_table_handles_fail() {
    let test_db = TestDb::new();
    let notes = test_db.table("notes");
    let other = notes.clone();
    notes.destroy().unwrap();

    assert!(matches!(
        other.insert_item("x", json!({})),
        Err(Error::UnknownTable { .. })
    ));

    // Re-creating gives a fresh empty table.
    let notes = test_db.table("notes");
    assert!(notes.is_empty().unwrap());
}

#[test]
fn kv_table_round_trip() {
    let test_db = TestDb::new();
    let kv = test_db.kv("settings");
    kv.set("theme", json!("dark")).unwrap();
    kv.set("theme", json!("light")).unwrap();

    assert_eq!(kv.get("theme").unwrap(), json!("light"));
    assert_eq!(kv.len().unwrap(), 1);
    assert!(matches!(kv.get("missing"), Err(Error::KeyNotFound { .. })));
}
