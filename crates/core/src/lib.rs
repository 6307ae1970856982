//! Core types for Coffer
//!
//! This crate defines the foundational types used throughout the system:
//! - Item: a JSON record with a reserved `id`
//! - Codec: checked deep copy of value graphs, freezing for storage
//! - Schema: per-field type declarations, defaulting and strict validators,
//!   schema digests
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod item;
pub mod schema;

pub use codec::{deep_copy, deep_copy_object, freeze, number, thaw, MAX_ARRAY_SIZE, MAX_NESTING_DEPTH};
pub use error::{Error, ErrorCategory, Result};
pub use item::{Item, ID_FIELD};
pub use schema::{FieldSchema, ScalarKind, Schema};
