//! Transaction atomicity across tables

use crate::common::*;

fn bank() -> TestDb {
    let test_db = TestDb::with_config(|config| {
        config
            .with_schema("accounts", Schema::new().number("balance", 0.0))
            .with_schema("ledger", Schema::new().string("note", ""))
    });
    let accounts = test_db.table("accounts");
    accounts.insert_item("alice", json!({"balance": 100})).unwrap();
    accounts.insert_item("bob", json!({"balance": 0})).unwrap();
    test_db.db.flush().unwrap();
    test_db
}

fn balance(test_db: &TestDb, id: &str) -> f64 {
    test_db
        .table("accounts")
        .fetch_item(id)
        .unwrap()
        .get("balance")
        .and_then(Value::as_f64)
        .unwrap()
}

#[test]
fn committed_transfer_touches_both_tables() {
    let mut test_db = bank();
    test_db
        .db
        .transaction()
        .exec(|tx| {
            let mut accounts = tx.fetch_table("accounts")?;
            accounts.merge_item_by_id("alice", json!({"balance": 60}))?;
            accounts.merge_item_by_id("bob", json!({"balance": 40}))?;
            tx.fetch_table("ledger")?
                .insert_item("t1", json!({"note": "alice->bob 40"}))?;
            Ok(())
        })
        .unwrap();

    // exec waited for the save, so the state survives a restart.
    test_db.reopen();
    assert_eq!(balance(&test_db, "alice"), 60.0);
    assert_eq!(balance(&test_db, "bob"), 40.0);
    assert!(test_db.table("ledger").has_item("t1").unwrap());
}

#[test]
fn failed_callback_applies_nothing_and_skips_save() {
    let test_db = bank();
    let saves_before = test_db.db.stats().requests;

    let result: Result<()> = test_db.db.transaction().exec(|tx| {
        let mut accounts = tx.fetch_table("accounts")?;
        accounts.merge_item_by_id("alice", json!({"balance": 0}))?;
        accounts.remove_item_by_id("bob")?;
        Err(Error::InvalidKey {
            reason: "abort".to_string(),
        })
    });

    assert!(result.is_err());
    assert_eq!(test_db.table("accounts").len().unwrap(), 2);
    assert_eq!(balance(&test_db, "alice"), 100.0);
    assert_eq!(test_db.db.stats().requests, saves_before);
}

#[test]
fn staged_removal_then_reinsert() {
    let test_db = bank();
    test_db
        .db
        .transaction()
        .exec(|tx| {
            let mut accounts = tx.fetch_table("accounts")?;
            let bob = accounts.fetch_item_cloned("bob")?;
            accounts.remove_item(&bob)?;
            assert_eq!(accounts.len()?, 1);
            accounts.insert_item("bob", json!({"balance": 5}))?;
            Ok(())
        })
        .unwrap();
    assert_eq!(balance(&test_db, "bob"), 5.0);
}
