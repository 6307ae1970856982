//! Query building and finalization over real tables

use crate::common::*;

fn seeded() -> TestDb {
    let test_db = TestDb::people();
    let people = test_db.table("people");
    people
        .insert_item("1", json!({"name": "bob", "age": 23, "tags": ["chess"]}))
        .unwrap();
    people
        .insert_item("2", json!({"name": "amy", "age": 23, "tags": ["chess", "go"]}))
        .unwrap();
    people
        .insert_item("3", json!({"name": "cid", "age": 40, "active": false}))
        .unwrap();
    test_db
}

fn names(items: &[std::sync::Arc<Item>]) -> Vec<&str> {
    items
        .iter()
        .map(|i| i.get("name").and_then(Value::as_str).unwrap_or_default())
        .collect()
}

#[test]
fn eq_then_ascend() {
    let test_db = seeded();
    let mut query = test_db.table("people").query().unwrap();
    let results = query
        .eq("age", 23)
        .unwrap()
        .ascend("name")
        .unwrap()
        .results()
        .unwrap();
    assert_eq!(names(&results), ["amy", "bob"]);
}

#[test]
fn query_is_bound_to_snapshot() {
    let test_db = seeded();
    let people = test_db.table("people");
    let mut query = people.query().unwrap();

    people.insert_item("4", json!({"name": "dee", "age": 23})).unwrap();
    people.remove_item_by_id("1").unwrap();

    assert_eq!(query.eq("age", 23).unwrap().count_results().unwrap(), 2);
}

#[test]
fn array_operators_over_tags() {
    let test_db = seeded();
    let people = test_db.table("people");

    let mut q = people.query().unwrap();
    assert_eq!(q.has("tags", "go").unwrap().count_results().unwrap(), 1);

    let mut q = people.query().unwrap();
    let results = q
        .has_none_of_any("tags", ["go"])
        .unwrap()
        .ascend("name")
        .unwrap()
        .results()
        .unwrap();
    assert_eq!(names(&results), ["bob", "cid"]);
}

#[test]
fn projection_and_pagination() {
    let test_db = seeded();
    let mut q = test_db.table("people").query().unwrap();
    let page = q
        .descend("age")
        .unwrap()
        .ascend("name")
        .unwrap()
        .offset(1)
        .unwrap()
        .limit(5)
        .unwrap()
        .select(["name"])
        .unwrap()
        .results_cloned()
        .unwrap();

    let values: Vec<_> = page.iter().map(Item::to_value).collect();
    assert_eq!(
        values,
        vec![json!({"id": "2", "name": "amy"}), json!({"id": "1", "name": "bob"})]
    );
}

#[test]
fn cloned_results_do_not_alias_storage() {
    let test_db = seeded();
    let people = test_db.table("people");
    let mut q = people.query().unwrap();
    let mut first = q.first_result_cloned().unwrap().unwrap();
    first.set("name", json!("changed")).unwrap();

    assert_eq!(
        people.fetch_item(first.id()).unwrap().get("name"),
        Some(&json!("bob"))
    );
}

#[test]
fn finalized_query_rejects_builders() {
    let test_db = seeded();
    let mut q = test_db.table("people").query().unwrap();
    assert!(q.has_results().unwrap());

    let err = q.ascend("name").unwrap_err();
    assert_eq!(err.category(), coffer::ErrorCategory::QueryState);
}
