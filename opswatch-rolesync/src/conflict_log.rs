//! Side-channel log of name collisions and per-team write failures.
//!
//! One JSON object per line, appended to `sync_errors.log` (or the
//! configured path). Best-effort: a failure to write the file is reported on
//! the console and otherwise ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resolver::Conflict;

/// Default side-log file name, relative to the working directory.
pub const DEFAULT_ERROR_LOG: &str = "sync_errors.log";

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRecord<'a> {
    Conflict {
        timestamp: DateTime<Utc>,
        short_name: &'a str,
        paths: Vec<&'a str>,
    },
    WriteFailure {
        timestamp: DateTime<Utc>,
        short_name: &'a str,
        error: &'a str,
    },
}

#[derive(Debug, Clone)]
pub struct ConflictLogger {
    path: PathBuf,
    persist: bool,
}

impl ConflictLogger {
    /// Logger appending to `path`. With `persist` off (dry-run) records are
    /// only written to the console.
    pub fn new(path: impl Into<PathBuf>, persist: bool) -> Self {
        Self {
            path: path.into(),
            persist,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Warn about a collision and append it to the side log.
    pub fn record_conflict(&self, conflict: &Conflict) {
        let paths: Vec<&str> = conflict.paths.iter().map(|p| p.0.as_str()).collect();
        tracing::warn!(
            role = %conflict.short_name,
            paths = %paths.join(", "),
            "team name conflict: {} teams share the name, none will be synced",
            paths.len()
        );
        self.append(&LogRecord::Conflict {
            timestamp: Utc::now(),
            short_name: &conflict.short_name,
            paths,
        });
    }

    /// Append a per-team write failure to the side log.
    pub fn record_failure(&self, short_name: &str, error: &str) {
        self.append(&LogRecord::WriteFailure {
            timestamp: Utc::now(),
            short_name,
            error,
        });
    }

    fn append(&self, record: &LogRecord<'_>) {
        if !self.persist {
            return;
        }
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "could not serialize sync log record");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(err) = result {
            tracing::error!(path = %self.path.display(), error = %err, "could not write sync log");
        }
    }
}
