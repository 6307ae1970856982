//! KvTable: unvalidated string-key store
//!
//! Values are any storable JSON value. They pass through the item codec
//! (finite numbers, bounded depth and array size) but are never checked
//! against a schema.

use crate::database::{KvState, Shared};
use coffer_core::{deep_copy, Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Handle to one KV table of a [`Database`](crate::Database)
///
/// # Example
///
/// ```ignore
/// let settings = db.get_or_create_kv_table("settings")?;
/// settings.set("theme", json!("dark"))?;
/// assert_eq!(settings.get("theme")?, json!("dark"));
/// ```
#[derive(Clone)]
pub struct KvTable {
    shared: Arc<Shared>,
    label: String,
}

impl KvTable {
    pub(crate) fn new(shared: Arc<Shared>, label: &str) -> Self {
        KvTable {
            shared,
            label: label.to_string(),
        }
    }

    /// KV table label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidKey {
                reason: "kv key must not be empty".to_string(),
            });
        }
        let value = deep_copy(&value)?;
        self.mutate(|_, kv| {
            kv.index.insert(key.to_string(), value);
            Ok(())
        })
    }

    /// True if `key` is present
    pub fn has(&self, key: &str) -> Result<bool> {
        self.read(|kv| Ok(kv.index.contains_key(key)))
    }

    /// Copy of the value under `key`
    pub fn get(&self, key: &str) -> Result<Value> {
        self.read(|kv| {
            kv.index
                .get(key)
                .cloned()
                .ok_or_else(|| self.not_found(key))
        })
    }

    /// Remove `key`
    pub fn delete(&self, key: &str) -> Result<()> {
        self.mutate(|this, kv| {
            kv.index
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| this.not_found(key))
        })
    }

    /// Remove every key
    pub fn clear(&self) -> Result<()> {
        self.mutate(|_, kv| {
            kv.index.clear();
            Ok(())
        })
    }

    /// Deregister the KV table
    pub fn destroy(&self) -> Result<()> {
        self.shared.ensure_initialized()?;
        self.shared
            .registry()
            .write()
            .kv_tables
            .remove(&self.label)
            .ok_or_else(|| Error::UnknownTable {
                label: self.label.clone(),
            })?;
        self.shared.request_save();
        Ok(())
    }

    /// Keys in ascending order
    pub fn keys(&self) -> Result<Vec<String>> {
        self.read(|kv| Ok(kv.index.keys().cloned().collect()))
    }

    /// Number of keys
    pub fn len(&self) -> Result<usize> {
        self.read(|kv| Ok(kv.index.len()))
    }

    /// True if no keys are stored
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|kv| Ok(kv.index.is_empty()))
    }

    fn not_found(&self, key: &str) -> Error {
        Error::KeyNotFound {
            table: self.label.clone(),
            key: key.to_string(),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&KvState) -> Result<T>) -> Result<T> {
        self.shared.ensure_initialized()?;
        let registry = self.shared.registry().read();
        f(registry.kv_table(&self.label)?)
    }

    fn mutate<T>(&self, f: impl FnOnce(&Self, &mut KvState) -> Result<T>) -> Result<T> {
        self.shared.ensure_initialized()?;
        let out = {
            let mut registry = self.shared.registry().write();
            f(self, registry.kv_table_mut(&self.label)?)?
        };
        self.shared.request_save();
        Ok(out)
    }
}

impl std::fmt::Debug for KvTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvTable").field("label", &self.label).finish()
    }
}
