//! In-memory table registry
//!
//! The registry is the single source of truth for table contents. Every
//! table and KV table of a database lives here behind one `RwLock`, so a
//! save cycle serializes a consistent view with a single read lock.

use coffer_core::{Error, Item, Result, Schema};
use coffer_durability::{KvTableRecord, Payload, TableRecord};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Contents and schema of one table
#[derive(Debug, Clone, Default)]
pub(crate) struct TableState {
    pub(crate) schema: Option<Arc<Schema>>,
    /// Digest persisted beside the items
    pub(crate) schema_hash: Option<String>,
    pub(crate) index: BTreeMap<String, Arc<Item>>,
}

impl TableState {
    pub(crate) fn new(schema: Option<Schema>) -> Self {
        let schema_hash = schema.as_ref().map(Schema::hash);
        TableState {
            schema: schema.map(Arc::new),
            schema_hash,
            index: BTreeMap::new(),
        }
    }
}

/// Contents of one KV table
#[derive(Debug, Clone, Default)]
pub(crate) struct KvState {
    pub(crate) index: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    pub(crate) tables: BTreeMap<String, TableState>,
    pub(crate) kv_tables: BTreeMap<String, KvState>,
}

impl Registry {
    pub(crate) fn table(&self, label: &str) -> Result<&TableState> {
        self.tables.get(label).ok_or_else(|| unknown(label))
    }

    pub(crate) fn table_mut(&mut self, label: &str) -> Result<&mut TableState> {
        self.tables.get_mut(label).ok_or_else(|| unknown(label))
    }

    pub(crate) fn kv_table(&self, label: &str) -> Result<&KvState> {
        self.kv_tables.get(label).ok_or_else(|| unknown(label))
    }

    pub(crate) fn kv_table_mut(&mut self, label: &str) -> Result<&mut KvState> {
        self.kv_tables.get_mut(label).ok_or_else(|| unknown(label))
    }

    /// Whole-database payload in label order
    pub(crate) fn to_payload(&self, filename: &str) -> Payload {
        let mut payload = Payload::new(filename);
        payload.1 = self
            .tables
            .iter()
            .map(|(label, table)| {
                TableRecord(
                    label.clone(),
                    table.index.values().map(|item| Item::clone(item)).collect(),
                    table.schema_hash.clone(),
                )
            })
            .collect();
        payload.2 = self
            .kv_tables
            .iter()
            .map(|(label, kv)| {
                KvTableRecord(
                    label.clone(),
                    kv.index.keys().cloned().collect(),
                    kv.index.values().cloned().collect(),
                )
            })
            .collect();
        payload
    }
}

fn unknown(label: &str) -> Error {
    Error::UnknownTable {
        label: label.to_string(),
    }
}
