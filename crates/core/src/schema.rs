//! Table schemas
//!
//! A [`Schema`] declares, per field, a scalar type with a default or an
//! array of one scalar kind. Two validators exist:
//!
//! - [`Schema::validate`] is the write path. Omitted fields receive their
//!   default (an empty array for array fields).
//! - [`Schema::validate_strict`] is the load path. Persisted items must be
//!   complete, so an omitted field is an error.
//!
//! The asymmetry is intentional: writers may rely on defaults, stored data
//! is expected to have been written through the defaulting path already.
//!
//! Each schema has a content digest ([`Schema::hash`]) that is persisted
//! beside the table's items and compared at load to detect drift.

use crate::codec::kind_name;
use crate::error::{Error, Result};
use crate::item::{Item, ID_FIELD};
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Element kind accepted by scalar and array fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// `true` / `false`
    Boolean,
    /// UTF-8 string
    String,
    /// Finite number
    Number,
}

impl ScalarKind {
    /// Declaration name (`"boolean"`, `"string"`, `"number"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Boolean => "boolean",
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
        }
    }

    /// Parse a declaration name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "boolean" => Some(ScalarKind::Boolean),
            "string" => Some(ScalarKind::String),
            "number" => Some(ScalarKind::Number),
            _ => None,
        }
    }

    /// Whether `value` is of this kind (numbers must be finite)
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ScalarKind::Boolean, Value::Bool(_)) => true,
            (ScalarKind::String, Value::String(_)) => true,
            (ScalarKind::Number, Value::Number(n)) => n.as_f64().map_or(false, f64::is_finite),
            _ => false,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor for one schema field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSchema {
    /// Boolean with default
    Boolean {
        /// Value used when the field is omitted
        default: bool,
    },
    /// String with default
    String {
        /// Value used when the field is omitted
        default: String,
    },
    /// Finite number with default
    Number {
        /// Value used when the field is omitted
        default: f64,
    },
    /// Array whose elements are all of one kind; defaults to `[]`
    Array {
        /// Accepted element kind
        accept: ScalarKind,
    },
}

impl FieldSchema {
    fn type_name(&self) -> &'static str {
        match self {
            FieldSchema::Boolean { .. } => "boolean",
            FieldSchema::String { .. } => "string",
            FieldSchema::Number { .. } => "number",
            FieldSchema::Array { .. } => "array",
        }
    }

    fn default_value(&self) -> Value {
        match self {
            FieldSchema::Boolean { default } => Value::Bool(*default),
            FieldSchema::String { default } => Value::String(default.clone()),
            FieldSchema::Number { default } => {
                Number::from_f64(*default).map_or(Value::Null, Value::Number)
            }
            FieldSchema::Array { .. } => Value::Array(Vec::new()),
        }
    }

    fn to_json(&self) -> Value {
        let mut desc = Map::new();
        desc.insert("type".to_string(), Value::String(self.type_name().to_string()));
        match self {
            FieldSchema::Array { accept } => {
                desc.insert("accept".to_string(), Value::String(accept.as_str().to_string()));
            }
            _ => {
                desc.insert("default".to_string(), self.default_value());
            }
        }
        Value::Object(desc)
    }

    /// Check `value` against this descriptor; `Err` carries the reason
    fn check_value(&self, field: &str, value: &Value) -> std::result::Result<(), String> {
        let expected = match self {
            FieldSchema::Boolean { .. } => ScalarKind::Boolean,
            FieldSchema::String { .. } => ScalarKind::String,
            FieldSchema::Number { .. } => ScalarKind::Number,
            FieldSchema::Array { accept } => {
                let elements = value.as_array().ok_or_else(|| {
                    format!(
                        "field '{}' expects an array of {}, got {}",
                        field,
                        accept,
                        kind_name(value)
                    )
                })?;
                for (i, element) in elements.iter().enumerate() {
                    if !accept.matches(element) {
                        return Err(format!(
                            "field '{}' index {} expects {}, got {}",
                            field,
                            i,
                            accept,
                            describe(element)
                        ));
                    }
                }
                return Ok(());
            }
        };
        if expected.matches(value) {
            Ok(())
        } else {
            Err(format!(
                "field '{}' expects {}, got {}",
                field,
                expected,
                describe(value)
            ))
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Number(n) if !n.as_f64().map_or(false, f64::is_finite) => {
            "non-finite number".to_string()
        }
        other => kind_name(other).to_string(),
    }
}

/// Field-type declaration for a table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: BTreeMap<String, FieldSchema>,
}

impl Schema {
    /// Empty schema (accepts only `{}` payloads)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field descriptor
    pub fn field(mut self, name: impl Into<String>, descriptor: FieldSchema) -> Self {
        self.fields.insert(name.into(), descriptor);
        self
    }

    /// Add a boolean field
    pub fn boolean(self, name: impl Into<String>, default: bool) -> Self {
        self.field(name, FieldSchema::Boolean { default })
    }

    /// Add a string field
    pub fn string(self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.field(
            name,
            FieldSchema::String {
                default: default.into(),
            },
        )
    }

    /// Add a number field
    pub fn number(self, name: impl Into<String>, default: f64) -> Self {
        self.field(name, FieldSchema::Number { default })
    }

    /// Add an array field
    pub fn array(self, name: impl Into<String>, accept: ScalarKind) -> Self {
        self.field(name, FieldSchema::Array { accept })
    }

    /// Descriptor for `name`
    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// Iterate declared fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldSchema)> {
        self.fields.iter()
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field is declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check the declaration itself
    ///
    /// Rejects the reserved `id` field, empty field names and non-finite
    /// number defaults.
    pub fn check(&self) -> Result<()> {
        for (name, descriptor) in &self.fields {
            if name.is_empty() {
                return Err(definition_error(name, "field name must not be empty"));
            }
            if name == ID_FIELD {
                return Err(definition_error(name, "'id' is reserved"));
            }
            if let FieldSchema::Number { default } = descriptor {
                if !default.is_finite() {
                    return Err(definition_error(name, "default must be a finite number"));
                }
            }
        }
        Ok(())
    }

    /// Parse a declaration of the form `{field: {type, default | accept}}`
    pub fn from_json(value: &Value) -> Result<Self> {
        let declared = value
            .as_object()
            .ok_or_else(|| definition_error("", "schema must be an object"))?;
        let mut schema = Schema::new();
        for (name, descriptor) in declared {
            let desc = descriptor
                .as_object()
                .ok_or_else(|| definition_error(name, "descriptor must be an object"))?;
            let type_name = match desc.get("type") {
                Some(Value::String(t)) => t.as_str(),
                Some(_) => return Err(definition_error(name, "'type' must be a string")),
                None => return Err(definition_error(name, "missing 'type'")),
            };
            let allowed: &[&str] = if type_name == "array" {
                &["type", "accept"]
            } else {
                &["type", "default"]
            };
            if let Some(extra) = desc.keys().find(|k| !allowed.contains(&k.as_str())) {
                return Err(definition_error(
                    name,
                    format!("unexpected descriptor key '{}'", extra),
                ));
            }
            let field = match type_name {
                "array" => {
                    let accept = desc
                        .get("accept")
                        .and_then(Value::as_str)
                        .and_then(ScalarKind::parse)
                        .ok_or_else(|| {
                            definition_error(
                                name,
                                "'accept' must be one of boolean, string, number",
                            )
                        })?;
                    FieldSchema::Array { accept }
                }
                "boolean" => match desc.get("default") {
                    Some(Value::Bool(b)) => FieldSchema::Boolean { default: *b },
                    _ => return Err(definition_error(name, "default must be a boolean")),
                },
                "string" => match desc.get("default") {
                    Some(Value::String(s)) => FieldSchema::String { default: s.clone() },
                    _ => return Err(definition_error(name, "default must be a string")),
                },
                "number" => match desc.get("default").and_then(Value::as_f64) {
                    Some(n) if n.is_finite() => FieldSchema::Number { default: n },
                    _ => return Err(definition_error(name, "default must be a finite number")),
                },
                other => {
                    return Err(definition_error(
                        name,
                        format!("unknown type '{}'", other),
                    ))
                }
            };
            schema.fields.insert(name.clone(), field);
        }
        schema.check()?;
        Ok(schema)
    }

    /// Canonical JSON form (keys sorted)
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, desc)| (name.clone(), desc.to_json()))
                .collect(),
        )
    }

    /// SHA-256 hex digest of the canonical JSON form
    pub fn hash(&self) -> String {
        let canonical = self.to_json().to_string();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Validate a write payload (without `id`), filling defaults
    pub fn validate(&self, table: &str, data: &Map<String, Value>) -> Result<Map<String, Value>> {
        self.reject_unknown(table, data.keys())?;
        let mut out = Map::new();
        for (name, descriptor) in &self.fields {
            match data.get(name) {
                Some(value) => {
                    descriptor
                        .check_value(name, value)
                        .map_err(|reason| Error::schema_mismatch(table, reason))?;
                    out.insert(name.clone(), value.clone());
                }
                None => {
                    out.insert(name.clone(), descriptor.default_value());
                }
            }
        }
        Ok(out)
    }

    /// Validate a persisted item; every declared field must be present
    pub fn validate_strict(&self, table: &str, item: &Item) -> Result<()> {
        self.reject_unknown(table, item.fields().map(|(k, _)| k))?;
        for (name, descriptor) in &self.fields {
            let value = item.get(name).ok_or_else(|| {
                Error::schema_mismatch(
                    table,
                    format!("item '{}' is missing required field '{}'", item.id(), name),
                )
            })?;
            descriptor
                .check_value(name, value)
                .map_err(|reason| Error::schema_mismatch(table, reason))?;
        }
        Ok(())
    }

    fn reject_unknown<'a>(
        &self,
        table: &str,
        mut keys: impl Iterator<Item = &'a String>,
    ) -> Result<()> {
        match keys.find(|k| !self.fields.contains_key(k.as_str())) {
            Some(unknown) => Err(Error::schema_mismatch(
                table,
                format!("unknown field '{}'", unknown),
            )),
            None => Ok(()),
        }
    }
}

fn definition_error(field: &str, reason: impl Into<String>) -> Error {
    Error::SchemaDefinition {
        field: field.to_string(),
        reason: reason.into(),
    }
}
