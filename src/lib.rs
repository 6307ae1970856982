//! Coffer - embedded, file-backed document store
//!
//! Coffer keeps typed tables of JSON records and key-value tables in
//! memory and persists the whole database to a small set of files using a
//! crash-safe rotation protocol, with optional dated snapshots and
//! schema-versioned migration.
//!
//! # Quick Start
//!
//! ```ignore
//! use coffer::{json, Database, DatabaseConfig, Schema};
//!
//! let config = DatabaseConfig::new("/var/lib/app", "app")
//!     .with_schema("people", Schema::new().string("name", "").number("age", 0.0));
//! let db = Database::open(config)?;
//!
//! let people = db.table("people")?;
//! people.insert_item("amy", json!({"name": "amy", "age": 23}))?;
//!
//! let mut query = people.query()?;
//! let adults = query.gte("age", 18)?.ascend("name")?.results()?;
//!
//! db.flush()?;
//! ```
//!
//! # Architecture
//!
//! - `coffer-core`: errors, items, the value codec and schemas
//! - `coffer-durability`: file naming, encodings, rotation and loading
//! - `coffer-engine`: the database, tables, queries and transactions

pub use coffer_core::{
    deep_copy, freeze, number, thaw, Error, ErrorCategory, FieldSchema, Item, Result, ScalarKind,
    Schema, ID_FIELD, MAX_ARRAY_SIZE, MAX_NESTING_DEPTH,
};
pub use coffer_durability::{FileSet, SaveFormat, FORMAT_VERSION};
pub use coffer_engine::{
    haversine_km, Database, DatabaseConfig, KvTable, LogFn, PseudoTable, Query, SaveHandle,
    SaveStats, Table, Transaction, UpdateFn,
};
pub use serde_json::{json, Map, Value};
