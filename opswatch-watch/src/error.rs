//! Error types for opswatch-watch.

use std::path::PathBuf;

use thiserror::Error;

use opswatch_core::HttpSetupError;

/// All errors that can abort a version-watch run.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Missing or invalid settings, detected before any network call.
    #[error("configuration validation failed:\n  - {}", .0.join("\n  - "))]
    ConfigValidation(Vec<String>),

    /// The release page could not be fetched (after retries).
    #[error("failed to fetch {url} after {attempts} attempt(s): {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The page was fetched but contained nothing version-shaped. Usually
    /// means the upstream page layout changed.
    #[error("no version found on {url}: {reason}; the page format may have changed")]
    NoVersionFound { url: String, reason: String },

    /// A notification channel could not deliver.
    #[error("{channel} notification failed: {message}")]
    NotificationDelivery {
        channel: &'static str,
        message: String,
    },

    /// Message template failed to render.
    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    /// Built-in extraction pattern failed to compile.
    #[error("invalid version pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("HTTP client setup failed: {0}")]
    HttpSetup(#[from] HttpSetupError),

    /// I/O failure on the version file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`WatchError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> WatchError {
    WatchError::Io {
        path: path.into(),
        source,
    }
}
