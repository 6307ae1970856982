//! Shared test utilities for all integration test suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

pub use coffer::{
    json, Database, DatabaseConfig, Error, Item, KvTable, Result, SaveFormat, Schema, Table, Value,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// TestDb - database wrapper over a temporary directory
// ============================================================================

/// Test database that can be reopened over the same files
pub struct TestDb {
    pub db: Database,
    pub dir: TempDir,
    pub config: DatabaseConfig,
}

impl TestDb {
    /// Fresh JSON database with no schemas
    pub fn new() -> Self {
        Self::with_config(|config| config)
    }

    /// Fresh database whose config is adjusted by `f`
    pub fn with_config(f: impl FnOnce(DatabaseConfig) -> DatabaseConfig) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = f(DatabaseConfig::new(dir.path(), "test"));
        let db = Database::open(config.clone()).expect("Failed to open test database");
        TestDb { db, dir, config }
    }

    /// Fresh database using the people schema
    pub fn people() -> Self {
        Self::with_config(|config| config.with_schema("people", people_schema()))
    }

    pub fn table(&self, label: &str) -> Table {
        self.db
            .get_or_create_table(label)
            .expect("Failed to get table")
    }

    pub fn kv(&self, label: &str) -> KvTable {
        self.db
            .get_or_create_kv_table(label)
            .expect("Failed to get kv table")
    }

    pub fn current_path(&self) -> PathBuf {
        self.db.files().current()
    }

    pub fn temp_path(&self) -> PathBuf {
        self.db.files().temp()
    }

    pub fn recent_path(&self) -> PathBuf {
        self.db.files().recent()
    }

    /// Flush, drop and open again over the same files (simulates restart)
    pub fn reopen(&mut self) {
        self.db.flush().expect("flush before reopen");
        self.reopen_with(self.config.clone())
            .expect("Failed to reopen database");
    }

    /// Drop the database and open it again with `config`
    pub fn reopen_with(&mut self, config: DatabaseConfig) -> Result<()> {
        self.close();
        self.db = Database::open(config.clone())?;
        self.config = config;
        Ok(())
    }

    /// Drop the database, leaving an uninitialized placeholder
    pub fn close(&mut self) {
        let placeholder = Database::new(self.config.clone()).expect("placeholder database");
        drop(std::mem::replace(&mut self.db, placeholder));
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn people_schema() -> Schema {
    Schema::new()
        .string("name", "")
        .number("age", 0.0)
        .boolean("active", true)
        .array("tags", coffer::ScalarKind::String)
}

/// Parse the main file as JSON
pub fn read_json(path: &Path) -> Value {
    let bytes = fs::read(path).expect("read database file");
    serde_json::from_slice(&bytes).expect("database file is JSON")
}

/// Items stored for `label` in a decoded JSON payload
pub fn stored_items(payload: &Value, label: &str) -> Vec<Value> {
    payload[1]
        .as_array()
        .into_iter()
        .flatten()
        .find(|table| table[0] == json!(label))
        .and_then(|table| table[1].as_array().cloned())
        .unwrap_or_default()
}
