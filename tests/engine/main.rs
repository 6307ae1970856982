//! Integration tests for tables, queries and transactions.
//!
//! These drive the public API against a real database over a temporary
//! directory, the way an embedding application would.

#[path = "../common/mod.rs"]
mod common;

mod query_api;
mod table_api;
mod table_properties;
mod transactions;
