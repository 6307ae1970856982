//! Persisted payload and save formats
//!
//! The whole database is written as one 3-tuple:
//!
//! ```text
//! [meta, tables, kvtables]
//! meta     = [filename, format_version]
//! tables   = [[label, items[], schema_hash | null], ...]
//! kvtables = [[label, keys[], values[]], ...]
//! ```
//!
//! JSON formats write it with `serde_json`, MessagePack with `rmp-serde`.
//! Both encoders see the same serde shape (tuple structs become arrays).

use coffer_core::{Error, Item, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Version stamped into `meta`; a mismatch at load is fatal
pub const FORMAT_VERSION: u32 = 1;

/// Extension used by the JSON formats
pub const JSON_EXTENSION: &str = "rrdb";

/// Extension used by MessagePack
pub const MSGPACK_EXTENSION: &str = "prrdb";

/// Encoding used for database files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveFormat {
    /// Compact JSON
    #[default]
    Json,
    /// Indented JSON
    ReadableJson,
    /// MessagePack
    MsgPack {
        /// Initial capacity of the encode buffer in bytes
        buffer_size: usize,
    },
}

impl SaveFormat {
    /// Default MessagePack encode buffer (1 MiB)
    pub const DEFAULT_MSGPACK_BUFFER: usize = 1024 * 1024;

    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Json | SaveFormat::ReadableJson => JSON_EXTENSION,
            SaveFormat::MsgPack { .. } => MSGPACK_EXTENSION,
        }
    }

    /// Configuration name (`json`, `readable_json`, `msgpack`)
    pub fn name(&self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::ReadableJson => "readable_json",
            SaveFormat::MsgPack { .. } => "msgpack",
        }
    }

    /// Encode a payload
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        match self {
            SaveFormat::Json => {
                serde_json::to_vec(payload).map_err(|e| Error::persistence(e.to_string()))
            }
            SaveFormat::ReadableJson => {
                serde_json::to_vec_pretty(payload).map_err(|e| Error::persistence(e.to_string()))
            }
            SaveFormat::MsgPack { buffer_size } => {
                let mut buf = Vec::with_capacity(*buffer_size);
                rmp_serde::encode::write(&mut buf, payload)
                    .map_err(|e| Error::persistence(e.to_string()))?;
                Ok(buf)
            }
        }
    }

    /// Decode a payload read from `path`
    pub fn decode(&self, bytes: &[u8], path: &Path) -> Result<Payload> {
        let corrupt = |reason: String| Error::Corruption {
            path: path.display().to_string(),
            reason,
        };
        match self {
            SaveFormat::Json | SaveFormat::ReadableJson => {
                serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))
            }
            SaveFormat::MsgPack { .. } => {
                rmp_serde::from_slice(bytes).map_err(|e| corrupt(e.to_string()))
            }
        }
    }
}

impl fmt::Display for SaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SaveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(SaveFormat::Json),
            "readable_json" => Ok(SaveFormat::ReadableJson),
            "msgpack" => Ok(SaveFormat::MsgPack {
                buffer_size: SaveFormat::DEFAULT_MSGPACK_BUFFER,
            }),
            other => Err(Error::config(format!(
                "unknown save format '{}', expected json, readable_json or msgpack",
                other
            ))),
        }
    }
}

/// `[filename, format_version]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta(pub String, pub u32);

/// `[label, items, schema_hash]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord(pub String, pub Vec<Item>, pub Option<String>);

/// `[label, keys, values]`; keys and values are parallel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvTableRecord(pub String, pub Vec<String>, pub Vec<Value>);

/// Whole-database payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload(pub Meta, pub Vec<TableRecord>, pub Vec<KvTableRecord>);

impl Payload {
    /// Payload for `filename` at the current format version
    pub fn new(filename: impl Into<String>) -> Self {
        Payload(Meta(filename.into(), FORMAT_VERSION), Vec::new(), Vec::new())
    }

    /// Stored metadata
    pub fn meta(&self) -> &Meta {
        &self.0
    }

    /// Table records in stored order
    pub fn tables(&self) -> &[TableRecord] {
        &self.1
    }

    /// KV table records in stored order
    pub fn kv_tables(&self) -> &[KvTableRecord] {
        &self.2
    }

    /// Split into owned parts
    pub fn into_parts(self) -> (Meta, Vec<TableRecord>, Vec<KvTableRecord>) {
        (self.0, self.1, self.2)
    }

    /// Fail unless the payload belongs to `filename` at [`FORMAT_VERSION`]
    pub fn check_meta(&self, filename: &str) -> Result<()> {
        let Meta(stored_name, stored_version) = &self.0;
        if stored_name != filename || *stored_version != FORMAT_VERSION {
            return Err(Error::FormatMismatch {
                expected: format!("[{}, {}]", filename, FORMAT_VERSION),
                found: format!("[{}, {}]", stored_name, stored_version),
            });
        }
        for kv in &self.2 {
            if kv.1.len() != kv.2.len() {
                return Err(Error::Corruption {
                    path: filename.to_string(),
                    reason: format!(
                        "kv table '{}' has {} keys but {} values",
                        kv.0,
                        kv.1.len(),
                        kv.2.len()
                    ),
                });
            }
        }
        Ok(())
    }
}
