//! Dated snapshot policy
//!
//! A snapshot is a retained copy of the main file taken just before it is
//! replaced. One is due when the configured interval has elapsed both since
//! the main file was last modified and since the previous snapshot.

use crate::paths::FileSet;
use std::time::{Duration, SystemTime};

/// Decides when the save cycle should retain a dated snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotPolicy {
    interval: Option<Duration>,
    last_snapshot: Option<SystemTime>,
}

impl SnapshotPolicy {
    /// Policy with snapshots disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Policy taking a snapshot at most once per `interval`
    pub fn every(interval: Duration) -> Self {
        SnapshotPolicy {
            interval: Some(interval),
            last_snapshot: None,
        }
    }

    /// Build from an optional interval
    pub fn from_interval(interval: Option<Duration>) -> Self {
        SnapshotPolicy {
            interval,
            last_snapshot: None,
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Time of the most recent snapshot known to the policy
    pub fn last_snapshot(&self) -> Option<SystemTime> {
        self.last_snapshot
    }

    /// Seed the last-snapshot time from files already on disk
    pub fn recover(&mut self, files: &FileSet) -> std::io::Result<()> {
        if let Some((_, path)) = files.list_snapshots()?.pop() {
            self.last_snapshot = Some(std::fs::metadata(path)?.modified()?);
        }
        Ok(())
    }

    /// Whether a snapshot is due given main's modification time
    pub fn is_due(&self, main_modified: SystemTime, now: SystemTime) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        let since_main = now.duration_since(main_modified).unwrap_or(Duration::ZERO);
        let since_last = match self.last_snapshot {
            Some(at) => now.duration_since(at).unwrap_or(Duration::ZERO),
            None => Duration::MAX,
        };
        since_main > interval && since_last > interval
    }

    /// Note that a snapshot was written at `at`
    pub fn record(&mut self, at: SystemTime) {
        self.last_snapshot = Some(at);
    }
}
