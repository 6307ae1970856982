//! Schema digest reconciliation at load

use crate::common::*;

fn v1() -> Schema {
    Schema::new().string("name", "")
}

fn v2() -> Schema {
    Schema::new().string("name", "").number("age", 18.0)
}

fn seeded_v1() -> TestDb {
    let mut test_db = TestDb::with_config(|config| config.with_schema("people", v1()));
    let people = test_db.table("people");
    people.insert_item("amy", json!({"name": "amy"})).unwrap();
    people.insert_item("bob", json!({"name": "bob"})).unwrap();
    test_db.reopen();
    test_db
}

#[test]
fn unchanged_schema_loads_without_saving() {
    let test_db = seeded_v1();
    assert_eq!(test_db.db.stats().cycles, 0);
    assert_eq!(test_db.table("people").len().unwrap(), 2);
}

#[test]
fn changed_schema_without_update_function_fails() {
    let mut test_db = seeded_v1();
    let config = test_db.config.clone().with_schema("people", v2());

    let err = test_db.reopen_with(config).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { ref table, .. } if table == "people"));
}

#[test]
fn migration_runs_and_resaves() {
    let mut test_db = seeded_v1();
    let config = test_db
        .config
        .clone()
        .with_schema("people", v2())
        .with_update_function("people", |mut item| {
            item.set("age", json!(30))?;
            Ok(item)
        });

    test_db.reopen_with(config).unwrap();

    // The save completed before initialize() returned.
    assert_eq!(test_db.db.stats().cycles, 1);
    let payload = read_json(&test_db.current_path());
    let people = payload[1]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t[0] == json!("people"))
        .unwrap();
    assert_eq!(people[2], json!(v2().hash()));
    assert_eq!(
        test_db.table("people").fetch_item("amy").unwrap().get("age"),
        Some(&json!(30))
    );
}

#[test]
fn migration_output_is_strictly_validated() {
    let mut test_db = seeded_v1();
    // Forgets to add the new field; load-time validation has no defaults.
    let config = test_db
        .config
        .clone()
        .with_schema("people", v2())
        .with_update_function("people", Ok);

    let err = test_db.reopen_with(config).unwrap_err();
    assert!(matches!(err, Error::SchemaMismatch { ref reason, .. } if reason.contains("age")));
}

#[test]
fn migration_may_not_change_ids() {
    let mut test_db = seeded_v1();
    let config = test_db
        .config
        .clone()
        .with_schema("people", v2())
        .with_update_function("people", |item| {
            let mut data = item.data();
            data.insert("age".to_string(), json!(1));
            Ok(Item::new(format!("{}-2", item.id()), data))
        });

    assert!(matches!(
        test_db.reopen_with(config),
        Err(Error::MigrationFailed { .. })
    ));
}

#[test]
fn failing_update_function_aborts_initialize() {
    let mut test_db = seeded_v1();
    let config = test_db
        .config
        .clone()
        .with_schema("people", v2())
        .with_update_function("people", |_| {
            Err(Error::InvalidKey {
                reason: "cannot migrate".to_string(),
            })
        });

    let err = test_db.reopen_with(config).unwrap_err();
    assert!(matches!(err, Error::MigrationFailed { ref reason, .. } if reason.contains("cannot migrate")));
}

#[test]
fn schema_dropped_from_config_loads_unvalidated() {
    let mut test_db = seeded_v1();
    let config = DatabaseConfig::new(test_db.dir.path(), "test");

    test_db.reopen_with(config).unwrap();

    let people = test_db.db.table("people").unwrap();
    assert!(people.schema().unwrap().is_none());
    people.insert_item("cid", json!({"anything": 1})).unwrap();
    assert_eq!(people.len().unwrap(), 3);
}
