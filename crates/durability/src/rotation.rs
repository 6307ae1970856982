//! Crash-safe save cycle
//!
//! Every cycle rotates the file set in this order:
//! 1. Write the encoded payload to the temp file and fsync it
//! 2. Copy the current main to `recent` (skipped when there is no main yet)
//! 3. Copy the current main to a dated snapshot when one is due
//! 4. Atomically rename temp over main
//! 5. fsync the directory
//!
//! A crash at any step leaves at least one complete file among
//! current/temp/recent, which is the order the loader tries them in.

use crate::paths::FileSet;
use crate::snapshot::SnapshotPolicy;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Outcome of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Bytes written to the main file
    pub bytes_written: usize,
    /// Whether a previous main was rotated into `recent`
    pub rotated: bool,
    /// Snapshot written during this cycle, if any
    pub snapshot: Option<PathBuf>,
}

/// Owns the database files for the duration of save cycles
///
/// Only one rotator exists per database and it is only driven while the
/// database's cycle lock is held.
#[derive(Debug)]
pub struct FileRotator {
    files: FileSet,
    snapshots: SnapshotPolicy,
}

impl FileRotator {
    /// Create a rotator over `files`
    pub fn new(files: FileSet, snapshots: SnapshotPolicy) -> Self {
        FileRotator { files, snapshots }
    }

    /// The file set being rotated
    pub fn files(&self) -> &FileSet {
        &self.files
    }

    /// Snapshot policy state
    pub fn snapshots(&self) -> &SnapshotPolicy {
        &self.snapshots
    }

    /// Mutable snapshot policy (used to seed it at load)
    pub fn snapshots_mut(&mut self) -> &mut SnapshotPolicy {
        &mut self.snapshots
    }

    /// Run one full rotation writing `bytes` as the new main
    pub fn write_cycle(&mut self, bytes: &[u8]) -> io::Result<CycleReport> {
        fs::create_dir_all(self.files.directory())?;

        let temp = self.files.temp();
        let current = self.files.current();

        write_synced(&temp, bytes)?;

        let mut rotated = false;
        let mut snapshot = None;
        if let Some(meta) = non_empty(&current)? {
            copy_synced(&current, &self.files.recent())?;
            rotated = true;

            let now = SystemTime::now();
            if self.snapshots.is_due(meta.modified()?, now) {
                let path = self.files.snapshot(Local::now());
                copy_synced(&current, &path)?;
                self.snapshots.record(now);
                info!(path = %path.display(), "Wrote dated snapshot");
                snapshot = Some(path);
            }
        }

        fs::rename(&temp, &current)?;
        sync_dir(self.files.directory())?;

        debug!(
            path = %current.display(),
            bytes = bytes.len(),
            rotated,
            "Save cycle complete"
        );

        Ok(CycleReport {
            bytes_written: bytes.len(),
            rotated,
            snapshot,
        })
    }
}

/// Metadata of `path` if it exists and is non-empty
pub(crate) fn non_empty(path: &Path) -> io::Result<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(Some(meta)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn copy_synced(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    File::open(to)?.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
