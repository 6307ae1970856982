//! Transactions: all-or-nothing multi-table mutation
//!
//! A [`Transaction`] stages writes in per-table [`PseudoTable`] shadows.
//! Reads through a pseudo table see staged writes first, then the real
//! table, and never see staged removals. Nothing touches the registry
//! until the callback passed to [`Transaction::exec`] returns `Ok`.
//!
//! Concurrent transactions are not coordinated with each other; the last
//! one applied wins for any item both touched.

use crate::database::{Shared, TableState};
use crate::table::build_item;
use coffer_core::codec::object_payload;
use coffer_core::{deep_copy_object, freeze, thaw, Error, Item, Result, Schema};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Staged changes for one table
#[derive(Debug, Default)]
struct Staging {
    schema: Option<Arc<Schema>>,
    writes: BTreeMap<String, Arc<Item>>,
    removed: BTreeSet<String>,
}

impl Staging {
    fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.removed.is_empty()
    }
}

/// Multi-table transaction over a [`Database`](crate::Database)
///
/// # Example
///
/// ```ignore
/// db.transaction().exec(|tx| {
///     let mut accounts = tx.fetch_table("accounts")?;
///     accounts.merge_item_by_id("a", json!({"balance": 10}))?;
///     accounts.merge_item_by_id("b", json!({"balance": 90}))?;
///     Ok(())
/// })?;
/// ```
pub struct Transaction<'db> {
    shared: &'db Shared,
    staged: BTreeMap<String, Staging>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(shared: &'db Shared) -> Self {
        Transaction {
            shared,
            staged: BTreeMap::new(),
        }
    }

    /// Staging view of table `label`
    ///
    /// The same staged changes are returned for repeated calls with the
    /// same label.
    pub fn fetch_table(&mut self, label: &str) -> Result<PseudoTable<'_>> {
        self.shared.ensure_initialized()?;
        let staging = match self.staged.entry(label.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let schema = self.shared.registry().read().table(label)?.schema.clone();
                entry.insert(Staging {
                    schema,
                    ..Staging::default()
                })
            }
        };
        Ok(PseudoTable {
            shared: self.shared,
            label: label.to_string(),
            staging,
        })
    }

    /// Run `f`, then apply everything it staged and wait for the save
    ///
    /// When `f` fails nothing is applied and no save is requested. When it
    /// succeeds all staged changes are applied under one registry write
    /// lock and `f`'s value is returned once a save covering them finished.
    pub fn exec<T, F>(mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'db>) -> Result<T>,
    {
        let value = f(&mut self)?;

        self.staged.retain(|_, staging| !staging.is_empty());
        if self.staged.is_empty() {
            return Ok(value);
        }

        {
            let mut registry = self.shared.registry().write();
            for label in self.staged.keys() {
                registry.table(label)?;
            }
            for (label, staging) in std::mem::take(&mut self.staged) {
                let table = registry.table_mut(&label)?;
                let (writes, removed) = (staging.writes.len(), staging.removed.len());
                table.index.extend(staging.writes);
                for id in &staging.removed {
                    table.index.remove(id);
                }
                debug!(
                    target: "coffer::txn",
                    table = %label,
                    writes,
                    removed,
                    "Applied staged changes"
                );
            }
        }

        self.shared.request_save().wait()?;
        Ok(value)
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("tables", &self.staged.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// In-transaction shadow of one table
pub struct PseudoTable<'a> {
    shared: &'a Shared,
    label: String,
    staging: &'a mut Staging,
}

impl PseudoTable<'_> {
    /// Table label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Fresh UUID v4 unused by both the real and the staged table
    pub fn random_item_id(&self) -> Result<String> {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.lookup(&id)?.is_none() && !self.staging.removed.contains(&id) {
                return Ok(id);
            }
        }
    }

    /// Stage a new item
    pub fn insert_item(&mut self, id: &str, data: Value) -> Result<Arc<Item>> {
        let data = object_payload(&data)?;
        if self.lookup(id)?.is_some() {
            return Err(Error::DuplicateId {
                table: self.label.clone(),
                id: id.to_string(),
            });
        }
        let item = freeze(build_item(&self.label, self.staging.schema.as_deref(), id, &data)?);
        Ok(self.stage(item))
    }

    /// Stage a full replacement of an existing item
    pub fn update_item(&mut self, item: Item) -> Result<Arc<Item>> {
        let data = deep_copy_object(&item.data())?;
        self.existing(item.id())?;
        let item = freeze(build_item(
            &self.label,
            self.staging.schema.as_deref(),
            item.id(),
            &data,
        )?);
        Ok(self.stage(item))
    }

    /// Stage a replacement payload for item `id`
    pub fn update_item_by_id(&mut self, id: &str, data: Value) -> Result<Arc<Item>> {
        let data = object_payload(&data)?;
        self.existing(id)?;
        let item = freeze(build_item(&self.label, self.staging.schema.as_deref(), id, &data)?);
        Ok(self.stage(item))
    }

    /// Stage `data` overlaid onto item `id`
    pub fn merge_item_by_id(&mut self, id: &str, data: Value) -> Result<Arc<Item>> {
        let patch = object_payload(&data)?;
        let mut merged = self.existing(id)?.data();
        for (field, value) in patch {
            if field == coffer_core::ID_FIELD {
                return Err(Error::InvalidKey {
                    reason: "payload must not carry the reserved 'id' field".to_string(),
                });
            }
            merged.insert(field, value);
        }
        let item = freeze(build_item(&self.label, self.staging.schema.as_deref(), id, &merged)?);
        Ok(self.stage(item))
    }

    /// Stage removal of `item`
    pub fn remove_item(&mut self, item: &Item) -> Result<()> {
        self.remove_item_by_id(item.id())
    }

    /// Stage removal of item `id`
    pub fn remove_item_by_id(&mut self, id: &str) -> Result<()> {
        self.existing(id)?;
        self.staging.writes.remove(id);
        self.staging.removed.insert(id.to_string());
        Ok(())
    }

    /// Item `id` as the transaction sees it
    pub fn fetch_item(&self, id: &str) -> Result<Arc<Item>> {
        self.existing(id)
    }

    /// Editable copy of item `id`
    pub fn fetch_item_cloned(&self, id: &str) -> Result<Item> {
        self.existing(id).map(|item| thaw(&item))
    }

    /// True if item `id` exists as the transaction sees it
    pub fn has_item(&self, id: &str) -> Result<bool> {
        Ok(self.lookup(id)?.is_some())
    }

    /// Ids visible to the transaction, ascending
    pub fn ids(&self) -> Result<Vec<String>> {
        self.with_table(|table| {
            let mut ids: BTreeSet<String> = table.index.keys().cloned().collect();
            ids.extend(self.staging.writes.keys().cloned());
            for id in &self.staging.removed {
                ids.remove(id);
            }
            Ok(ids.into_iter().collect())
        })
    }

    /// Number of items visible to the transaction
    pub fn len(&self) -> Result<usize> {
        self.ids().map(|ids| ids.len())
    }

    /// True if no items are visible to the transaction
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    fn stage(&mut self, item: Arc<Item>) -> Arc<Item> {
        let id = item.id().to_string();
        self.staging.removed.remove(&id);
        self.staging.writes.insert(id, Arc::clone(&item));
        item
    }

    fn lookup(&self, id: &str) -> Result<Option<Arc<Item>>> {
        if self.staging.removed.contains(id) {
            return Ok(None);
        }
        if let Some(item) = self.staging.writes.get(id) {
            return Ok(Some(Arc::clone(item)));
        }
        self.with_table(|table| Ok(table.index.get(id).cloned()))
    }

    fn existing(&self, id: &str) -> Result<Arc<Item>> {
        self.lookup(id)?.ok_or_else(|| Error::ItemNotFound {
            table: self.label.clone(),
            id: id.to_string(),
        })
    }

    fn with_table<T>(&self, f: impl FnOnce(&TableState) -> Result<T>) -> Result<T> {
        let registry = self.shared.registry().read();
        f(registry.table(&self.label)?)
    }
}

impl std::fmt::Debug for PseudoTable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudoTable")
            .field("label", &self.label)
            .field("writes", &self.staging.writes.len())
            .field("removed", &self.staging.removed.len())
            .finish()
    }
}
