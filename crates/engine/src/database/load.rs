//! Restore the registry from disk
//!
//! Loading runs synchronously inside `initialize()`. It picks the preferred
//! file, reconciles every stored schema digest against the configured
//! schema, migrates drifted tables through their update function and
//! strictly validates what it keeps.

use super::config::DatabaseConfig;
use super::registry::{KvState, Registry, TableState};
use coffer_core::{freeze, Error, Item, Result};
use coffer_durability::{load, FileRole, KvTableRecord, SnapshotPolicy, TableRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// What `initialize()` installs
pub(crate) struct Restored {
    pub(crate) registry: Registry,
    /// A full save must run before `initialize()` returns
    pub(crate) needs_save: bool,
    /// Diagnostic lines for the optional log callback
    pub(crate) notes: Vec<String>,
}

pub(crate) fn restore(config: &DatabaseConfig, snapshots: &mut SnapshotPolicy) -> Result<Restored> {
    let files = config.files();
    snapshots.recover(&files)?;

    let mut restored = Restored {
        registry: Registry::default(),
        needs_save: false,
        notes: Vec::new(),
    };

    match load(&files, config.save_format)? {
        Some(loaded) => {
            if loaded.role != FileRole::Current {
                restored.notes.push(format!(
                    "main file unusable, loaded {}",
                    loaded.path.display()
                ));
            }
            let (_, tables, kv_tables) = loaded.payload.into_parts();
            let source = loaded.path.display().to_string();
            for record in tables {
                restore_table(config, &source, record, &mut restored)?;
            }
            for record in kv_tables {
                restore_kv_table(record, &mut restored.registry);
            }
            info!(
                target: "coffer::db",
                path = %loaded.path.display(),
                tables = restored.registry.tables.len(),
                kv_tables = restored.registry.kv_tables.len(),
                "Loaded database"
            );
        }
        None => {
            info!(
                target: "coffer::db",
                directory = %files.directory().display(),
                filename = files.filename(),
                "No database file found, starting empty"
            );
            restored
                .notes
                .push(format!("no database file for '{}', starting empty", files.filename()));
            restored.needs_save = true;
        }
    }

    for (label, schema) in &config.schemas {
        restored
            .registry
            .tables
            .entry(label.clone())
            .or_insert_with(|| TableState::new(Some(schema.clone())));
    }

    Ok(restored)
}

fn restore_table(
    config: &DatabaseConfig,
    source: &str,
    record: TableRecord,
    restored: &mut Restored,
) -> Result<()> {
    let TableRecord(label, mut items, stored_hash) = record;

    let state = match config.schemas.get(&label) {
        Some(schema) => {
            let hash = schema.hash();
            if stored_hash.as_deref() != Some(hash.as_str()) {
                items = migrate(config, &label, items)?;
                warn!(
                    target: "coffer::db",
                    table = %label,
                    items = items.len(),
                    "Schema changed, migrated table"
                );
                restored
                    .notes
                    .push(format!("migrated {} items in table '{}'", items.len(), label));
                restored.needs_save = true;
            }
            for item in &items {
                schema.validate_strict(&label, item)?;
            }
            TableState {
                schema: Some(Arc::new(schema.clone())),
                schema_hash: Some(hash),
                index: index_items(source, &label, items)?,
            }
        }
        None => {
            if stored_hash.is_some() {
                warn!(
                    target: "coffer::db",
                    table = %label,
                    "Table was stored with a schema but none is configured, loading unvalidated"
                );
                restored.notes.push(format!(
                    "table '{}' has a stored schema but none is configured",
                    label
                ));
            }
            TableState {
                schema: None,
                schema_hash: stored_hash,
                index: index_items(source, &label, items)?,
            }
        }
    };

    restored.registry.tables.insert(label, state);
    Ok(())
}

fn migrate(config: &DatabaseConfig, label: &str, items: Vec<Item>) -> Result<Vec<Item>> {
    let update = config.update_functions.get(label).ok_or_else(|| {
        Error::schema_mismatch(
            label,
            "stored schema differs from the configured schema and no update function is registered",
        )
    })?;

    items
        .into_iter()
        .map(|item| {
            let id = item.id().to_string();
            let migrated = update(item).map_err(|e| Error::MigrationFailed {
                table: label.to_string(),
                reason: format!("item '{}': {}", id, e),
            })?;
            if migrated.id() != id {
                return Err(Error::MigrationFailed {
                    table: label.to_string(),
                    reason: format!("item '{}' came back with id '{}'", id, migrated.id()),
                });
            }
            Ok(migrated)
        })
        .collect()
}

fn index_items(source: &str, label: &str, items: Vec<Item>) -> Result<BTreeMap<String, Arc<Item>>> {
    let mut index = BTreeMap::new();
    for item in items {
        let id = item.id().to_string();
        if index.insert(id.clone(), freeze(item)).is_some() {
            return Err(Error::Corruption {
                path: source.to_string(),
                reason: format!("duplicate item id '{}' in table '{}'", id, label),
            });
        }
    }
    Ok(index)
}

fn restore_kv_table(record: KvTableRecord, registry: &mut Registry) {
    let KvTableRecord(label, keys, values) = record;
    let index = keys.into_iter().zip(values).collect();
    registry.kv_tables.insert(label, KvState { index });
}

