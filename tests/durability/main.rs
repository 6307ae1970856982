//! Integration tests for the persistence layer.
//!
//! These cover the open → write → close → reopen lifecycle: file
//! rotation, load fallback, encodings, schema migration and failure
//! delivery through save handles.

#[path = "../common/mod.rs"]
mod common;

mod failures;
mod file_rotation;
mod migration;
mod save_coalescing;
