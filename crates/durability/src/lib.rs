//! Durability layer for Coffer
//!
//! This crate handles everything that touches disk:
//!
//! - File set: main/temp/recent/snapshot naming in one directory
//! - Payload: the `[meta, tables, kvtables]` shape and its JSON/MessagePack encodings
//! - Rotation: the crash-safe write-fsync-copy-rename save cycle
//! - Snapshots: dated copies of the main file at most once per interval
//! - Loading: main → temp → recent preference

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod loader;
pub mod paths;
pub mod payload;
pub mod rotation;
pub mod snapshot;

pub use loader::{load, locate, FileRole, LoadedPayload};
pub use paths::{FileSet, SNAPSHOT_TIME_FORMAT};
pub use payload::{
    KvTableRecord, Meta, Payload, SaveFormat, TableRecord, FORMAT_VERSION, JSON_EXTENSION,
    MSGPACK_EXTENSION,
};
pub use rotation::{CycleReport, FileRotator};
pub use snapshot::SnapshotPolicy;
