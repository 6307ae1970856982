//! Item codec
//!
//! Deep-copies JSON value graphs, checking every value on the way. This is
//! the only path by which caller data enters stored state and by which
//! stored state leaves as a mutable copy.
//!
//! # Limits
//!
//! | Limit | Value | Constant |
//! |-------|-------|----------|
//! | Max nesting depth | 100 levels | [`MAX_NESTING_DEPTH`] |
//! | Max array size | 1M elements | [`MAX_ARRAY_SIZE`] |

use crate::error::{Error, Result};
use crate::item::Item;
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// Maximum nesting depth of a stored value (100 levels)
///
/// Bounds recursion in copy, validation and serialization.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Maximum array size in elements (1 million elements)
pub const MAX_ARRAY_SIZE: usize = 1_000_000;

/// Build a JSON number, rejecting NaN and infinities
pub fn number(n: f64) -> Result<Value> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| Error::InvalidValue {
            path: String::new(),
            reason: format!("{} is not a finite number", n),
        })
}

/// Deep-copy a value after checking it is storable
pub fn deep_copy(value: &Value) -> Result<Value> {
    copy_at(value, "", 0)
}

/// Deep-copy an object payload
pub fn deep_copy_object(map: &Map<String, Value>) -> Result<Map<String, Value>> {
    copy_object(map, "", 0)
}

/// Interpret a caller payload as an object and copy it
pub fn object_payload(value: &Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => deep_copy_object(map),
        other => Err(Error::InvalidValue {
            path: String::new(),
            reason: format!("item data must be an object, got {}", kind_name(other)),
        }),
    }
}

/// Freeze an item for storage
pub fn freeze(item: Item) -> Arc<Item> {
    Arc::new(item)
}

/// Independent mutable copy of a stored item
pub fn thaw(item: &Item) -> Item {
    item.clone()
}

/// Human-readable kind of a JSON value
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn copy_at(value: &Value, path: &str, depth: usize) -> Result<Value> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::InvalidValue {
            path: path.to_string(),
            reason: format!("nesting exceeds maximum of {} levels", MAX_NESTING_DEPTH),
        });
    }
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !f.is_finite() => Err(Error::InvalidValue {
                path: path.to_string(),
                reason: "number is not finite".to_string(),
            }),
            _ => Ok(value.clone()),
        },
        Value::Array(items) => {
            if items.len() > MAX_ARRAY_SIZE {
                return Err(Error::InvalidValue {
                    path: path.to_string(),
                    reason: format!(
                        "array size {} exceeds maximum of {} elements",
                        items.len(),
                        MAX_ARRAY_SIZE
                    ),
                });
            }
            items
                .iter()
                .enumerate()
                .map(|(i, v)| copy_at(v, &format!("{}[{}]", path, i), depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        Value::Object(map) => copy_object(map, path, depth).map(Value::Object),
    }
}

fn copy_object(map: &Map<String, Value>, path: &str, depth: usize) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, v) in map {
        out.insert(key.clone(), copy_at(v, &join_key(path, key), depth + 1)?);
    }
    Ok(out)
}
