//! Error types for Coffer
//!
//! Every fallible operation in the workspace returns [`Error`]. We use
//! `thiserror` for the `Display` and `Error` implementations.
//!
//! The enum is `Clone` because a single save cycle outcome is delivered to
//! every caller batched into that cycle.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Config | `Config` |
//! | SchemaDefinition | `SchemaDefinition` |
//! | SchemaMismatch | `SchemaMismatch`, `InvalidValue`, `MigrationFailed` |
//! | Identity | `DuplicateId`, `ItemNotFound`, `KeyNotFound`, `InvalidKey`, `UnknownTable` |
//! | QueryState | `QueryState` |
//! | Persistence | `Persistence` |
//! | Format | `FormatMismatch`, `Corruption` |
//! | State | `NotInitialized`, `AlreadyInitialized` |

use std::io;
use thiserror::Error;

/// Result type alias for Coffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Coffer document store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid constructor options
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong with the options
        reason: String,
    },

    /// Malformed schema declaration
    #[error("invalid schema for field '{field}': {reason}")]
    SchemaDefinition {
        /// Offending field (empty for the schema as a whole)
        field: String,
        /// Violated expectation
        reason: String,
    },

    /// Item payload does not satisfy the table schema
    #[error("schema mismatch in table '{table}': {reason}")]
    SchemaMismatch {
        /// Table label
        table: String,
        /// Field/index and expectation
        reason: String,
    },

    /// A value kind the codec refuses to store
    #[error("invalid value at '{path}': {reason}")]
    InvalidValue {
        /// Path of the offending value (`a.b[2]`)
        path: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Migration function failed or produced an unusable item
    #[error("migration failed for table '{table}': {reason}")]
    MigrationFailed {
        /// Table label
        table: String,
        /// Failure description
        reason: String,
    },

    /// Insert with an id that already exists
    #[error("item '{id}' already exists in table '{table}'")]
    DuplicateId {
        /// Table label
        table: String,
        /// Duplicate id
        id: String,
    },

    /// Item id not present in the table
    #[error("item '{id}' not found in table '{table}'")]
    ItemNotFound {
        /// Table label
        table: String,
        /// Missing id
        id: String,
    },

    /// Key not present in the key-value table
    #[error("key '{key}' not found in kv table '{table}'")]
    KeyNotFound {
        /// KV table label
        table: String,
        /// Missing key
        key: String,
    },

    /// Empty or otherwise unusable id/key/label
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What was wrong
        reason: String,
    },

    /// Table or KV table is not registered with the database
    #[error("table '{label}' is not registered")]
    UnknownTable {
        /// Table label
        label: String,
    },

    /// Query builder misuse
    #[error("query error: {reason}")]
    QueryState {
        /// What was wrong
        reason: String,
    },

    /// Failure inside a save cycle
    #[error("persistence error: {reason}")]
    Persistence {
        /// Underlying failure
        reason: String,
    },

    /// Persisted file could not be decoded
    #[error("corrupt database file '{path}': {reason}")]
    Corruption {
        /// File that failed to decode
        path: String,
        /// Decoder message
        reason: String,
    },

    /// Persisted metadata does not belong to this database
    #[error("format mismatch: expected {expected}, found {found}")]
    FormatMismatch {
        /// Expected `[filename, version]`
        expected: String,
        /// Stored `[filename, version]`
        found: String,
    },

    /// Table access before `initialize()`
    #[error("database is not initialized")]
    NotInitialized,

    /// Second call to `initialize()`
    #[error("database is already initialized")]
    AlreadyInitialized,
}

/// Coarse error classes, one per failure domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad constructor options
    Config,
    /// Malformed schema
    SchemaDefinition,
    /// Item violates schema, codec or migration rules
    SchemaMismatch,
    /// Duplicate or missing id/key/table
    Identity,
    /// Query builder misuse
    QueryState,
    /// Save cycle failure
    Persistence,
    /// Persisted file belongs elsewhere or cannot be decoded
    Format,
    /// Lifecycle misuse
    State,
}

impl Error {
    /// Build a [`Error::Config`]
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Build a [`Error::SchemaMismatch`]
    pub fn schema_mismatch(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`Error::QueryState`]
    pub fn query_state(reason: impl Into<String>) -> Self {
        Error::QueryState {
            reason: reason.into(),
        }
    }

    /// Build a [`Error::Persistence`]
    pub fn persistence(reason: impl Into<String>) -> Self {
        Error::Persistence {
            reason: reason.into(),
        }
    }

    /// Failure domain of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config { .. } => ErrorCategory::Config,
            Error::SchemaDefinition { .. } => ErrorCategory::SchemaDefinition,
            Error::SchemaMismatch { .. }
            | Error::InvalidValue { .. }
            | Error::MigrationFailed { .. } => ErrorCategory::SchemaMismatch,
            Error::DuplicateId { .. }
            | Error::ItemNotFound { .. }
            | Error::KeyNotFound { .. }
            | Error::InvalidKey { .. }
            | Error::UnknownTable { .. } => ErrorCategory::Identity,
            Error::QueryState { .. } => ErrorCategory::QueryState,
            Error::Persistence { .. } => ErrorCategory::Persistence,
            Error::FormatMismatch { .. } | Error::Corruption { .. } => ErrorCategory::Format,
            Error::NotInitialized | Error::AlreadyInitialized => ErrorCategory::State,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Persistence {
            reason: e.to_string(),
        }
    }
}
