//! Item type
//!
//! An [`Item`] is a JSON object with a reserved string `id` field. Stored
//! items are shared as `Arc<Item>` and never mutated; callers that want to
//! edit a record work on an owned clone and hand it back to the table.

use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reserved field holding the item identifier
pub const ID_FIELD: &str = "id";

/// A record: field map plus the reserved `id`
///
/// The `id` always lives inside the field map so the serialized shape is
/// the plain object `{ "id": ..., ...fields }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    fields: Map<String, Value>,
}

impl Item {
    /// Build an item from an id and its payload
    ///
    /// An `id` key inside `data` is overwritten by `id`.
    pub fn new(id: impl Into<String>, mut data: Map<String, Value>) -> Self {
        data.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Item { fields: data }
    }

    /// Build an item from a map that already carries its `id`
    pub fn from_map(fields: Map<String, Value>) -> Result<Self> {
        match fields.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Ok(Item { fields }),
            Some(other) => Err(Error::InvalidKey {
                reason: format!("item id must be a non-empty string, got {}", other),
            }),
            None => Err(Error::InvalidKey {
                reason: "item has no 'id' field".to_string(),
            }),
        }
    }

    /// The item identifier
    pub fn id(&self) -> &str {
        self.fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Value of a field (including `id`)
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a payload field, returning the previous value
    ///
    /// The `id` field cannot be reassigned this way.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Result<Option<Value>> {
        let field = field.into();
        if field == ID_FIELD {
            return Err(Error::InvalidKey {
                reason: "the 'id' field cannot be reassigned".to_string(),
            });
        }
        Ok(self.fields.insert(field, value))
    }

    /// Remove a payload field; `id` is never removed
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.remove(field)
    }

    /// Payload fields, excluding `id`
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().filter(|(k, _)| k.as_str() != ID_FIELD)
    }

    /// Copy of the payload without `id`
    pub fn data(&self) -> Map<String, Value> {
        self.fields()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Full field map including `id`
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume into the full field map
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    /// JSON object form of the item
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Keep only the named payload fields (plus `id`)
    pub fn retain_fields(&mut self, keep: &[String]) {
        self.fields
            .retain(|k, _| k == ID_FIELD || keep.iter().any(|f| f == k));
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        Item::from_map(fields).map_err(D::Error::custom)
    }
}
