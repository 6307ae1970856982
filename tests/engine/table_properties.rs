//! Property tests over table writes

use crate::common::*;
use coffer::Map;
use proptest::prelude::*;

fn payload() -> impl Strategy<Value = Map<String, Value>> {
    (
        prop::option::of("[a-z]{0,12}"),
        prop::option::of(-1.0e9f64..1.0e9),
        prop::option::of(any::<bool>()),
        prop::option::of(prop::collection::vec("[a-z]{1,4}", 0..5)),
    )
        .prop_map(|(name, age, active, tags)| {
            let mut map = Map::new();
            if let Some(name) = name {
                map.insert("name".to_string(), json!(name));
            }
            if let Some(age) = age {
                map.insert("age".to_string(), json!(age));
            }
            if let Some(active) = active {
                map.insert("active".to_string(), json!(active));
            }
            if let Some(tags) = tags {
                map.insert("tags".to_string(), json!(tags));
            }
            map
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn insert_then_fetch_fills_defaults(data in payload(), id in "[a-z0-9]{1,16}") {
        let test_db = TestDb::people();
        let people = test_db.table("people");

        people.insert_item(&id, Value::Object(data.clone())).unwrap();
        let stored = people.fetch_item(&id).unwrap();

        let mut expected = json!({
            "id": id,
            "name": "",
            "age": 0.0,
            "active": true,
            "tags": [],
        });
        for (k, v) in data {
            expected[k.as_str()] = v;
        }
        prop_assert_eq!(stored.to_value(), expected);
    }

    #[test]
    fn repeated_results_are_identical(ages in prop::collection::vec(0u8..100, 0..20)) {
        let test_db = TestDb::people();
        let people = test_db.table("people");
        for (i, age) in ages.iter().enumerate() {
            people.insert_item(&format!("p{}", i), json!({"age": age})).unwrap();
        }

        let mut query = people.query().unwrap();
        query.gte("age", 50).unwrap().ascend("age").unwrap();
        let first = query.results().unwrap();
        let second = query.results().unwrap();
        prop_assert_eq!(first, second);
    }
}
