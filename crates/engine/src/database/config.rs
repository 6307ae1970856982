//! Database configuration
//!
//! Everything a [`Database`](super::Database) needs is fixed at
//! construction: where the files live, how they are encoded, which tables
//! carry schemas, how drifted tables are migrated, and whether dated
//! snapshots are kept.

use coffer_core::{Error, Item, Result, Schema};
use coffer_durability::{FileSet, SaveFormat};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Optional diagnostic sink; never required for correctness
pub type LogFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-table migration applied to every loaded item when the stored schema
/// digest differs from the configured schema
pub type UpdateFn = Arc<dyn Fn(Item) -> Result<Item> + Send + Sync>;

/// Database configuration
///
/// # Example
///
/// ```ignore
/// let config = DatabaseConfig::new("/var/lib/app", "app")
///     .with_save_format(SaveFormat::ReadableJson)
///     .with_schema("users", Schema::new().string("name", ""))
///     .with_snapshot_interval(Duration::from_secs(3600));
/// ```
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Base name of every database file
    pub filename: String,
    /// Directory holding the files
    pub directory: PathBuf,
    /// Encoding of the files
    pub save_format: SaveFormat,
    /// Schemas by table label
    pub schemas: BTreeMap<String, Schema>,
    /// Migration functions by table label
    pub update_functions: BTreeMap<String, UpdateFn>,
    /// Minimum time between dated snapshots; `None` disables them
    pub snapshot_interval: Option<Duration>,
    /// Diagnostic sink
    pub log_function: Option<LogFn>,
}

impl DatabaseConfig {
    /// Config for `filename` in `directory` with JSON encoding
    pub fn new(directory: impl AsRef<Path>, filename: impl Into<String>) -> Self {
        DatabaseConfig {
            filename: filename.into(),
            directory: directory.as_ref().to_path_buf(),
            save_format: SaveFormat::default(),
            schemas: BTreeMap::new(),
            update_functions: BTreeMap::new(),
            snapshot_interval: None,
            log_function: None,
        }
    }

    /// Set the file encoding
    pub fn with_save_format(mut self, format: SaveFormat) -> Self {
        self.save_format = format;
        self
    }

    /// Declare the schema of a table
    pub fn with_schema(mut self, label: impl Into<String>, schema: Schema) -> Self {
        self.schemas.insert(label.into(), schema);
        self
    }

    /// Register a migration function for a table
    pub fn with_update_function<F>(mut self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(Item) -> Result<Item> + Send + Sync + 'static,
    {
        self.update_functions.insert(label.into(), Arc::new(f));
        self
    }

    /// Enable dated snapshots
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = Some(interval);
        self
    }

    /// Install a diagnostic sink
    pub fn with_log_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.log_function = Some(Arc::new(f));
        self
    }

    /// File set described by this config
    pub fn files(&self) -> FileSet {
        FileSet::new(&self.directory, self.filename.clone(), self.save_format.extension())
    }

    /// Check the options
    ///
    /// # Errors
    ///
    /// `Config` for empty or path-like filenames, an empty directory, a zero
    /// MessagePack buffer, a zero snapshot interval or an empty table label;
    /// `SchemaDefinition` for a malformed schema.
    pub fn validate(&self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(Error::config("filename must not be empty"));
        }
        if self.filename.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "filename '{}' must not contain path separators",
                self.filename
            )));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(Error::config("directory must not be empty"));
        }
        if let SaveFormat::MsgPack { buffer_size: 0 } = self.save_format {
            return Err(Error::config("msgpack buffer size must be positive"));
        }
        if self.snapshot_interval == Some(Duration::ZERO) {
            return Err(Error::config("snapshot interval must be positive"));
        }
        for (label, schema) in &self.schemas {
            if label.is_empty() {
                return Err(Error::config("schema table label must not be empty"));
            }
            schema.check()?;
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("filename", &self.filename)
            .field("directory", &self.directory)
            .field("save_format", &self.save_format)
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .field(
                "update_functions",
                &self.update_functions.keys().collect::<Vec<_>>(),
            )
            .field("snapshot_interval", &self.snapshot_interval)
            .field("log_function", &self.log_function.is_some())
            .finish()
    }
}
