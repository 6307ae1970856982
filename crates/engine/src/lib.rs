//! Database engine for Coffer
//!
//! This crate ties the lower layers together:
//! - Database: registry of tables, `initialize()` load logic, save worker
//! - Table / KvTable: validated and unvalidated collections
//! - Query: filter, sort and projection over a table snapshot
//! - Transaction: staged multi-table mutation
//!
//! The engine is the only component that knows about:
//! - When saves are requested and how they are coalesced
//! - Schema reconciliation and migration at load

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod kv_table;
pub mod query;
pub mod table;
pub mod transaction;

pub use database::{Database, DatabaseConfig, LogFn, SaveHandle, SaveStats, UpdateFn};
pub use kv_table::KvTable;
pub use query::{haversine_km, Query, EARTH_RADIUS_KM};
pub use table::Table;
pub use transaction::{PseudoTable, Transaction};
