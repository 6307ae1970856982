//! Save request coalescing
//!
//! Mutations never write files themselves. They push a request onto the
//! [`SaveQueue`] and get a [`SaveHandle`] back. A single worker thread per
//! database takes every queued request at once, runs one full save cycle,
//! and resolves the whole batch with that cycle's outcome. Requests that
//! arrive while a cycle is running form the next batch.
//!
//! # Thread Lifecycle
//!
//! - `shutdown()` stops accepting requests and wakes the worker
//! - the worker drains every batch still queued before it exits
//! - requests made after shutdown are rejected so the caller can save inline

use coffer_core::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Counters describing save pipeline activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    /// Save requests issued (one per mutation or explicit save)
    pub requests: u64,
    /// Save cycles run to completion or failure
    pub cycles: u64,
    /// Cycles that failed
    pub failures: u64,
}

struct SaveSlot {
    outcome: Mutex<Option<Result<()>>>,
    ready: Condvar,
}

impl SaveSlot {
    fn new() -> Self {
        SaveSlot {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn resolve(&self, result: Result<()>) {
        let mut outcome = self.outcome.lock();
        *outcome = Some(result);
        self.ready.notify_all();
    }
}

/// Completion handle for one save request
///
/// Resolves once a save cycle that started after the request was queued
/// has finished. Dropping the handle does not cancel the save.
#[derive(Clone)]
pub struct SaveHandle {
    slot: Arc<SaveSlot>,
}

impl SaveHandle {
    fn pending() -> Self {
        SaveHandle {
            slot: Arc::new(SaveSlot::new()),
        }
    }

    /// Handle that is already resolved with `result`
    pub(crate) fn resolved(result: Result<()>) -> Self {
        let handle = Self::pending();
        handle.slot.resolve(result);
        handle
    }

    /// Block until the covering save cycle finishes
    pub fn wait(&self) -> Result<()> {
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            self.slot.ready.wait(&mut outcome);
        }
    }

    /// Like [`SaveHandle::wait`] but gives up after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<()>> {
        let mut outcome = self.slot.outcome.lock();
        if outcome.is_none() {
            self.slot.ready.wait_for(&mut outcome, timeout);
        }
        outcome.clone()
    }

    /// True once the covering cycle has finished
    pub fn is_done(&self) -> bool {
        self.slot.outcome.lock().is_some()
    }
}

impl std::fmt::Debug for SaveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveHandle")
            .field("done", &self.is_done())
            .finish()
    }
}

struct QueueState {
    batch: Vec<Arc<SaveSlot>>,
    shutdown: bool,
}

/// Pending save requests waiting for the next cycle
pub(crate) struct SaveQueue {
    state: Mutex<QueueState>,
    work_ready: Condvar,
}

/// Requests taken together by one cycle
pub(crate) struct Batch {
    slots: Vec<Arc<SaveSlot>>,
}

impl Batch {
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Deliver one outcome to every request in the batch
    pub(crate) fn resolve(self, result: &Result<()>) {
        for slot in self.slots {
            slot.resolve(result.clone());
        }
    }
}

impl SaveQueue {
    pub(crate) fn new() -> Self {
        SaveQueue {
            state: Mutex::new(QueueState {
                batch: Vec::new(),
                shutdown: false,
            }),
            work_ready: Condvar::new(),
        }
    }

    /// Queue a request; `None` once the queue is shut down
    pub(crate) fn push(&self) -> Option<SaveHandle> {
        let handle = SaveHandle::pending();
        {
            let mut state = self.state.lock();
            if state.shutdown {
                return None;
            }
            state.batch.push(Arc::clone(&handle.slot));
        }
        self.work_ready.notify_one();
        Some(handle)
    }

    /// Block until requests are queued and take all of them
    ///
    /// Returns `None` only after shutdown once nothing is left.
    pub(crate) fn next_batch(&self) -> Option<Batch> {
        let mut state = self.state.lock();
        loop {
            if !state.batch.is_empty() {
                return Some(Batch {
                    slots: std::mem::take(&mut state.batch),
                });
            }
            if state.shutdown {
                return None;
            }
            self.work_ready.wait(&mut state);
        }
    }

    /// Stop accepting requests and wake the worker
    pub(crate) fn shutdown(&self) {
        // Lock before notifying so a worker between its shutdown check and
        // wait() cannot miss the wakeup.
        let mut state = self.state.lock();
        state.shutdown = true;
        self.work_ready.notify_all();
    }
}

/// Run `cycle` with panics turned into a persistence error
pub(crate) fn guarded<F>(cycle: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(cycle)) {
        Ok(result) => result,
        Err(e) => Err(Error::persistence(format!(
            "save cycle panicked: {}",
            e.downcast_ref::<&str>()
                .copied()
                .or_else(|| e.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("(non-string panic)")
        ))),
    }
}
