//! Database struct and open/close logic
//!
//! This module provides the main Database struct that orchestrates:
//! - Loading persisted state on `initialize()`
//! - The table and KV table registry
//! - The background save worker
//!
//! ## Save pipeline
//!
//! Every mutation updates the registry synchronously and then queues a save
//! request. The worker takes all queued requests at once, runs one cycle
//! (encode the whole registry, rotate files) and resolves every request of
//! the batch with the outcome. Callers that need durability wait on the
//! returned [`SaveHandle`] or call [`Database::flush`].
//!
//! Dropping the Database drains the queue and joins the worker. Table
//! handles that outlive it still work; their saves run inline.

pub mod config;
mod load;
mod registry;
mod saver;

pub use config::{DatabaseConfig, LogFn, UpdateFn};
pub use saver::{SaveHandle, SaveStats};

pub(crate) use registry::{KvState, Registry, TableState};

use crate::kv_table::KvTable;
use crate::table::Table;
use crate::transaction::Transaction;
use coffer_core::{Error, Result};
use coffer_durability::{FileRotator, FileSet, SnapshotPolicy};
use parking_lot::{Mutex, RwLock};
use saver::{guarded, SaveQueue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// State shared by the database, its handles and the save worker
pub(crate) struct Shared {
    config: DatabaseConfig,
    files: FileSet,
    registry: RwLock<Registry>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    saver: SaveQueue,
    /// Cycle lock: held for the whole of every save cycle
    rotator: Mutex<FileRotator>,
    requests: AtomicU64,
    cycles: AtomicU64,
    failures: AtomicU64,
}

impl Shared {
    fn new(config: DatabaseConfig) -> Self {
        let files = config.files();
        let snapshots = SnapshotPolicy::from_interval(config.snapshot_interval);
        Shared {
            rotator: Mutex::new(FileRotator::new(files.clone(), snapshots)),
            files,
            config,
            registry: RwLock::new(Registry::default()),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            saver: SaveQueue::new(),
            requests: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &RwLock<Registry> {
        &self.registry
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    /// Forward a diagnostic line to the configured callback
    pub(crate) fn report(&self, line: &str) {
        if let Some(log) = &self.config.log_function {
            log(line);
        }
    }

    /// Queue a save covering every mutation made so far
    pub(crate) fn request_save(&self) -> SaveHandle {
        if let Err(e) = self.ensure_initialized() {
            return SaveHandle::resolved(Err(e));
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        match self.saver.push() {
            Some(handle) => handle,
            None => {
                debug!(target: "coffer::save", "Save worker stopped, saving inline");
                SaveHandle::resolved(self.run_guarded_cycle())
            }
        }
    }

    fn run_guarded_cycle(&self) -> Result<()> {
        let result = guarded(|| self.run_cycle());
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            error!(target: "coffer::save", error = %e, "Save cycle failed");
            self.report(&format!("save failed: {}", e));
        }
        result
    }

    /// Serialize the registry and rotate it onto disk
    fn run_cycle(&self) -> Result<()> {
        let mut rotator = self.rotator.lock();
        let payload = self.registry.read().to_payload(&self.config.filename);
        let bytes = self.config.save_format.encode(&payload)?;
        let report = rotator.write_cycle(&bytes)?;
        if let Some(path) = &report.snapshot {
            self.report(&format!("wrote snapshot {}", path.display()));
        }
        Ok(())
    }
}

fn save_loop(shared: Arc<Shared>) {
    while let Some(batch) = shared.saver.next_batch() {
        let requests = batch.len();
        let result = shared.run_guarded_cycle();
        debug!(
            target: "coffer::save",
            requests,
            ok = result.is_ok(),
            "Resolved save batch"
        );
        batch.resolve(&result);
    }
    debug!(target: "coffer::save", "Save worker exiting");
}

/// An embedded, file-backed document store
///
/// # Example
///
/// ```ignore
/// let db = Database::open(DatabaseConfig::new(dir, "app"))?;
/// let users = db.get_or_create_table("users")?;
/// users.insert_item("u1", json!({"name": "amy"}))?;
/// db.flush()?;
/// ```
pub struct Database {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Create a database and start its save worker
    ///
    /// Nothing is read from disk until [`Database::initialize`].
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared::new(config));

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("coffer-save-{}", shared.config.filename))
            .spawn(move || save_loop(worker_shared))
            .map_err(|e| Error::persistence(format!("failed to spawn save worker: {}", e)))?;

        Ok(Database {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Create and initialize in one step
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let db = Self::new(config)?;
        db.initialize()?;
        Ok(db)
    }

    /// Load persisted state, or create an empty store
    ///
    /// Declared tables are created here. When no file existed, or a table
    /// had to be migrated, a full save completes before this returns.
    ///
    /// # Errors
    ///
    /// - `AlreadyInitialized` on a second successful call
    /// - `FormatMismatch` / `Corruption` for an unusable main file
    /// - `SchemaMismatch` / `MigrationFailed` when stored tables disagree
    ///   with the configured schemas
    /// - `Persistence` when the initial save fails
    pub fn initialize(&self) -> Result<()> {
        let shared = &self.shared;
        let _guard = shared.init_lock.lock();
        if shared.initialized.load(Ordering::Acquire) {
            return Err(Error::AlreadyInitialized);
        }

        let restored = {
            let mut rotator = shared.rotator.lock();
            load::restore(&shared.config, rotator.snapshots_mut())?
        };
        for note in &restored.notes {
            shared.report(note);
        }
        *shared.registry.write() = restored.registry;

        if restored.needs_save {
            shared.run_guarded_cycle()?;
        }
        shared.initialized.store(true, Ordering::Release);

        info!(
            target: "coffer::db",
            path = %shared.files.current().display(),
            format = %shared.config.save_format,
            "Database initialized"
        );
        Ok(())
    }

    /// True once `initialize()` has succeeded
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    /// The configuration this database was built from
    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }

    /// The files this database reads and writes
    pub fn files(&self) -> &FileSet {
        &self.shared.files
    }

    /// Handle to `label`, creating an empty table if needed
    ///
    /// A table declared in the configured schemas gets that schema.
    pub fn get_or_create_table(&self, label: &str) -> Result<Table> {
        self.shared.ensure_initialized()?;
        check_label(label)?;
        let created = {
            let mut registry = self.shared.registry.write();
            if registry.tables.contains_key(label) {
                false
            } else {
                let schema = self.shared.config.schemas.get(label).cloned();
                registry
                    .tables
                    .insert(label.to_string(), TableState::new(schema));
                true
            }
        };
        if created {
            debug!(target: "coffer::db", table = label, "Created table");
            self.shared.request_save();
        }
        Ok(Table::new(Arc::clone(&self.shared), label))
    }

    /// Handle to an existing table
    pub fn table(&self, label: &str) -> Result<Table> {
        self.shared.ensure_initialized()?;
        self.shared.registry.read().table(label)?;
        Ok(Table::new(Arc::clone(&self.shared), label))
    }

    /// Handle to KV table `label`, creating it if needed
    pub fn get_or_create_kv_table(&self, label: &str) -> Result<KvTable> {
        self.shared.ensure_initialized()?;
        check_label(label)?;
        let created = {
            let mut registry = self.shared.registry.write();
            if registry.kv_tables.contains_key(label) {
                false
            } else {
                registry
                    .kv_tables
                    .insert(label.to_string(), KvState::default());
                true
            }
        };
        if created {
            debug!(target: "coffer::db", kv_table = label, "Created kv table");
            self.shared.request_save();
        }
        Ok(KvTable::new(Arc::clone(&self.shared), label))
    }

    /// Handle to an existing KV table
    pub fn kv_table(&self, label: &str) -> Result<KvTable> {
        self.shared.ensure_initialized()?;
        self.shared.registry.read().kv_table(label)?;
        Ok(KvTable::new(Arc::clone(&self.shared), label))
    }

    /// Labels of every registered table
    pub fn table_labels(&self) -> Vec<String> {
        self.shared.registry.read().tables.keys().cloned().collect()
    }

    /// Labels of every registered KV table
    pub fn kv_table_labels(&self) -> Vec<String> {
        self.shared.registry.read().kv_tables.keys().cloned().collect()
    }

    /// Queue a save of the current state
    pub fn save(&self) -> SaveHandle {
        self.shared.request_save()
    }

    /// Save and wait until everything mutated so far is on disk
    pub fn flush(&self) -> Result<()> {
        self.save().wait()
    }

    /// Start a transaction over this database
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(&self.shared)
    }

    /// Save pipeline counters
    pub fn stats(&self) -> SaveStats {
        SaveStats {
            requests: self.shared.requests.load(Ordering::Relaxed),
            cycles: self.shared.cycles.load(Ordering::Relaxed),
            failures: self.shared.failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("files", &self.shared.files)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Pending requests are drained by the worker before it exits.
        self.shared.saver.shutdown();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!(target: "coffer::save", "Save worker panicked");
            }
        }
    }
}

pub(crate) fn check_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::InvalidKey {
            reason: "table label must not be empty".to_string(),
        });
    }
    Ok(())
}
