//! Database file set
//!
//! A database is a group of sibling files in one directory, all named from
//! the configured `filename`:
//!
//! ```text
//! <directory>/
//! ├── <filename>-current.<ext>                 # main: last known-good state
//! ├── <filename>-temp.<ext>                    # scratch, written first each cycle
//! ├── <filename>-recent.<ext>                  # previous main (one-generation rollback)
//! └── <filename>_<DD-MM-YY-HH-mm-ss>.<ext>     # dated snapshots
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::path::{Path, PathBuf};

/// chrono format for snapshot timestamps (`DD-MM-YY-HH-mm-ss`)
pub const SNAPSHOT_TIME_FORMAT: &str = "%d-%m-%y-%H-%M-%S";

/// Paths of every file belonging to one database
#[derive(Debug, Clone)]
pub struct FileSet {
    directory: PathBuf,
    filename: String,
    extension: &'static str,
}

impl FileSet {
    /// Create the file set for `filename` inside `directory`
    pub fn new(directory: impl AsRef<Path>, filename: impl Into<String>, extension: &'static str) -> Self {
        FileSet {
            directory: directory.as_ref().to_path_buf(),
            filename: filename.into(),
            extension,
        }
    }

    /// Directory holding the files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Configured base filename
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Main file (`<filename>-current.<ext>`)
    pub fn current(&self) -> PathBuf {
        self.named("current")
    }

    /// Scratch file (`<filename>-temp.<ext>`)
    pub fn temp(&self) -> PathBuf {
        self.named("temp")
    }

    /// Previous main (`<filename>-recent.<ext>`)
    pub fn recent(&self) -> PathBuf {
        self.named("recent")
    }

    /// Dated snapshot path for `at`
    pub fn snapshot(&self, at: DateTime<Local>) -> PathBuf {
        self.directory.join(format!(
            "{}_{}.{}",
            self.filename,
            at.format(SNAPSHOT_TIME_FORMAT),
            self.extension
        ))
    }

    /// Timestamp encoded in a snapshot file name, if `name` is one of ours
    pub fn parse_snapshot_name(&self, name: &str) -> Option<DateTime<Local>> {
        let stamp = name
            .strip_prefix(self.filename.as_str())?
            .strip_prefix('_')?
            .strip_suffix(self.extension)?
            .strip_suffix('.')?;
        let naive = NaiveDateTime::parse_from_str(stamp, SNAPSHOT_TIME_FORMAT).ok()?;
        Local.from_local_datetime(&naive).earliest()
    }

    /// Existing snapshot files, oldest first
    pub fn list_snapshots(&self) -> std::io::Result<Vec<(DateTime<Local>, PathBuf)>> {
        let mut found = Vec::new();
        if !self.directory.exists() {
            return Ok(found);
        }
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(at) = self.parse_snapshot_name(&name) {
                found.push((at, entry.path()));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn named(&self, role: &str) -> PathBuf {
        self.directory
            .join(format!("{}-{}.{}", self.filename, role, self.extension))
    }
}
