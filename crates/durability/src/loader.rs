//! Load-file selection
//!
//! The main file is preferred. When it is missing or empty the scratch file
//! from an interrupted cycle is used, then the previous main. If none is
//! usable the database starts empty.

use crate::paths::FileSet;
use crate::payload::{Payload, SaveFormat};
use crate::rotation::non_empty;
use coffer_core::Result;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Which member of the file set a load came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// `<filename>-current`
    Current,
    /// `<filename>-temp`
    Temp,
    /// `<filename>-recent`
    Recent,
}

/// Decoded payload plus where it came from
#[derive(Debug, Clone)]
pub struct LoadedPayload {
    /// Source file
    pub path: PathBuf,
    /// Role of the source file
    pub role: FileRole,
    /// Decoded and meta-checked payload
    pub payload: Payload,
}

/// First usable file in load-preference order
pub fn locate(files: &FileSet) -> std::io::Result<Option<(FileRole, PathBuf)>> {
    let candidates = [
        (FileRole::Current, files.current()),
        (FileRole::Temp, files.temp()),
        (FileRole::Recent, files.recent()),
    ];
    for (role, path) in candidates {
        if non_empty(&path)?.is_some() {
            return Ok(Some((role, path)));
        }
        debug!(path = %path.display(), "Load candidate missing or empty");
    }
    Ok(None)
}

/// Read, decode and meta-check the preferred file
///
/// Returns `Ok(None)` when no file is usable. A file that exists but cannot
/// be decoded, or whose meta does not match, is a fatal error.
pub fn load(files: &FileSet, format: SaveFormat) -> Result<Option<LoadedPayload>> {
    let Some((role, path)) = locate(files)? else {
        return Ok(None);
    };
    if role != FileRole::Current {
        warn!(path = %path.display(), ?role, "Main file unusable, loading fallback");
    }
    let bytes = std::fs::read(&path)?;
    let payload = format.decode(&bytes, &path)?;
    payload.check_meta(files.filename())?;
    Ok(Some(LoadedPayload {
        path,
        role,
        payload,
    }))
}
