//! Version store: the single last-seen version, persisted as one line of
//! text.
//!
//! Writes use the `.tmp` + rename pattern so a reader never sees a partial
//! value. No history is kept.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{io_err, WatchError};

#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored version, or `None` when the file is missing or blank
    /// (first run).
    pub fn read(&self) -> Result<Option<String>, WatchError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let version = contents.trim();
                if version.is_empty() {
                    tracing::info!(
                        path = %self.path.display(),
                        "version file is empty, treating as first run"
                    );
                    Ok(None)
                } else {
                    tracing::debug!(path = %self.path.display(), version, "read last version");
                    Ok(Some(version.to_string()))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "no previous version file found, this appears to be the first run"
                );
                Ok(None)
            }
            Err(err) => Err(io_err(&self.path, err)),
        }
    }

    /// Replace the stored value with `version`.
    ///
    /// Writes to `<path>.tmp` then renames to `<path>`.
    pub fn write(&self, version: &str) -> Result<(), WatchError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let tmp = self.tmp_path();
        std::fs::write(&tmp, version).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        tracing::debug!(path = %self.path.display(), version, "wrote version file");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}
