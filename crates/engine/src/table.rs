//! Table: schema-bound collection of items keyed by id
//!
//! A [`Table`] is a stateless handle; all contents live in the database
//! registry. Mutations update the registry synchronously and queue a save.
//! Stored items are shared as `Arc<Item>`; the `_cloned` variants hand out
//! owned copies the caller may edit and pass back to [`Table::update_item`].
//!
//! ## Thread Safety
//!
//! Table is `Send + Sync` and cheap to clone. Handles for the same label
//! observe the same contents.

use crate::database::{Shared, TableState};
use crate::query::Query;
use coffer_core::codec::object_payload;
use coffer_core::{deep_copy_object, freeze, thaw, Error, Item, Result, Schema, ID_FIELD};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

/// Handle to one table of a [`Database`](crate::Database)
#[derive(Clone)]
pub struct Table {
    shared: Arc<Shared>,
    label: String,
}

impl Table {
    pub(crate) fn new(shared: Arc<Shared>, label: &str) -> Self {
        Table {
            shared,
            label: label.to_string(),
        }
    }

    /// Table label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Schema the table validates against, if any
    pub fn schema(&self) -> Result<Option<Arc<Schema>>> {
        self.read(|table| Ok(table.schema.clone()))
    }

    /// Fresh UUID v4 not used by any item of this table
    pub fn random_item_id(&self) -> Result<String> {
        self.read(|table| {
            let mut id = Uuid::new_v4().to_string();
            while table.index.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }
            Ok(id)
        })
    }

    // ========== Writes ==========

    /// Insert a new item
    ///
    /// `data` must be an object without an `id` key. With a schema, unknown
    /// fields are rejected and omitted fields take their defaults.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if `id` exists, `InvalidKey` for an empty id, and
    /// `SchemaMismatch` / `InvalidValue` for an unacceptable payload.
    pub fn insert_item(&self, id: &str, data: Value) -> Result<Arc<Item>> {
        let data = object_payload(&data)?;
        self.mutate(|label, table| {
            if table.index.contains_key(id) {
                return Err(Error::DuplicateId {
                    table: label.to_string(),
                    id: id.to_string(),
                });
            }
            let item = freeze(build_item(label, table.schema.as_deref(), id, &data)?);
            table.index.insert(id.to_string(), Arc::clone(&item));
            Ok(item)
        })
    }

    /// [`Table::insert_item`] returning an editable copy
    pub fn insert_item_cloned(&self, id: &str, data: Value) -> Result<Item> {
        self.insert_item(id, data).map(|item| thaw(&item))
    }

    /// Replace an existing item with `item`, revalidating the whole object
    pub fn update_item(&self, item: Item) -> Result<Arc<Item>> {
        let data = deep_copy_object(&item.data())?;
        self.replace(item.id(), data)
    }

    /// Replace the payload of item `id` with `data`
    pub fn update_item_by_id(&self, id: &str, data: Value) -> Result<Arc<Item>> {
        let data = object_payload(&data)?;
        self.replace(id, data)
    }

    /// Overlay `data` onto item `id` and revalidate the result
    pub fn merge_item_by_id(&self, id: &str, data: Value) -> Result<Arc<Item>> {
        let patch = object_payload(&data)?;
        reject_id_field(&patch)?;
        self.mutate(|label, table| {
            let mut merged = existing(label, table, id)?.data();
            merged.extend(patch);
            let item = freeze(build_item(label, table.schema.as_deref(), id, &merged)?);
            table.index.insert(id.to_string(), Arc::clone(&item));
            Ok(item)
        })
    }

    /// Remove `item` by its id
    pub fn remove_item(&self, item: &Item) -> Result<()> {
        self.remove_item_by_id(item.id())
    }

    /// Remove item `id`
    pub fn remove_item_by_id(&self, id: &str) -> Result<()> {
        self.mutate(|label, table| {
            table.index.remove(id).map(|_| ()).ok_or_else(|| Error::ItemNotFound {
                table: label.to_string(),
                id: id.to_string(),
            })
        })
    }

    /// Remove every item
    pub fn clear(&self) -> Result<()> {
        self.mutate(|_, table| {
            table.index.clear();
            Ok(())
        })
    }

    /// Deregister the table; this and every other handle become unusable
    pub fn destroy(&self) -> Result<()> {
        self.shared.ensure_initialized()?;
        {
            let mut registry = self.shared.registry().write();
            registry.tables.remove(&self.label).ok_or_else(|| Error::UnknownTable {
                label: self.label.clone(),
            })?;
        }
        trace!(target: "coffer::table", table = %self.label, "Destroyed table");
        self.shared.request_save();
        Ok(())
    }

    // ========== Reads ==========

    /// Stored item `id`
    pub fn fetch_item(&self, id: &str) -> Result<Arc<Item>> {
        self.read(|table| existing(&self.label, table, id).map(Arc::clone))
    }

    /// Editable copy of item `id`
    pub fn fetch_item_cloned(&self, id: &str) -> Result<Item> {
        self.fetch_item(id).map(|item| thaw(&item))
    }

    /// True if item `id` exists
    pub fn has_item(&self, id: &str) -> Result<bool> {
        self.read(|table| Ok(table.index.contains_key(id)))
    }

    /// Number of items
    pub fn len(&self) -> Result<usize> {
        self.read(|table| Ok(table.index.len()))
    }

    /// True if the table holds no items
    pub fn is_empty(&self) -> Result<bool> {
        self.read(|table| Ok(table.index.is_empty()))
    }

    /// Item ids in index order
    pub fn ids(&self) -> Result<Vec<String>> {
        self.read(|table| Ok(table.index.keys().cloned().collect()))
    }

    /// Stored items in index order
    pub fn items(&self) -> Result<Vec<Arc<Item>>> {
        self.read(|table| Ok(table.index.values().cloned().collect()))
    }

    /// Query over the table's current contents
    pub fn query(&self) -> Result<Query> {
        let items = self.items()?;
        Ok(Query::new(&self.label, items))
    }

    // ========== Internals ==========

    fn replace(&self, id: &str, data: Map<String, Value>) -> Result<Arc<Item>> {
        self.mutate(|label, table| {
            existing(label, table, id)?;
            let item = freeze(build_item(label, table.schema.as_deref(), id, &data)?);
            table.index.insert(id.to_string(), Arc::clone(&item));
            Ok(item)
        })
    }

    fn read<T>(&self, f: impl FnOnce(&TableState) -> Result<T>) -> Result<T> {
        self.shared.ensure_initialized()?;
        let registry = self.shared.registry().read();
        f(registry.table(&self.label)?)
    }

    /// Apply `f` under the registry write lock, then queue a save
    ///
    /// Nothing is saved when `f` fails.
    fn mutate<T>(&self, f: impl FnOnce(&str, &mut TableState) -> Result<T>) -> Result<T> {
        self.shared.ensure_initialized()?;
        let out = {
            let mut registry = self.shared.registry().write();
            f(&self.label, registry.table_mut(&self.label)?)?
        };
        self.shared.request_save();
        Ok(out)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table").field("label", &self.label).finish()
    }
}

/// Validate `data` for table `label` and attach `id`
///
/// Shared by direct writes and transaction staging.
pub(crate) fn build_item(
    label: &str,
    schema: Option<&Schema>,
    id: &str,
    data: &Map<String, Value>,
) -> Result<Item> {
    check_id(id)?;
    reject_id_field(data)?;
    let data = match schema {
        Some(schema) => schema.validate(label, data)?,
        None => data.clone(),
    };
    Ok(Item::new(id, data))
}

pub(crate) fn check_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidKey {
            reason: "item id must not be empty".to_string(),
        });
    }
    Ok(())
}

fn reject_id_field(data: &Map<String, Value>) -> Result<()> {
    if data.contains_key(ID_FIELD) {
        return Err(Error::InvalidKey {
            reason: "payload must not carry the reserved 'id' field".to_string(),
        });
    }
    Ok(())
}

fn existing<'a>(label: &str, table: &'a TableState, id: &str) -> Result<&'a Arc<Item>> {
    table.index.get(id).ok_or_else(|| Error::ItemNotFound {
        table: label.to_string(),
        id: id.to_string(),
    })
}
