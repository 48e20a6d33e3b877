//! Error types for opswatch-rolesync.

use std::path::PathBuf;

use thiserror::Error;

use opswatch_core::{HttpFailure, HttpSetupError, RetryError};

/// All errors that can arise from a role-sync run.
#[derive(Debug, Error)]
pub enum RoleSyncError {
    /// Credentials, scope, or permissions were rejected.
    #[error("authentication failed against {service}: {reason}")]
    Auth {
        service: &'static str,
        reason: String,
    },

    /// The remote host could not be reached (after retries).
    #[error("network error: {0}")]
    Network(String),

    /// The remote API answered with a non-2xx status.
    #[error("{service} API error: HTTP {status} from {url}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        url: String,
        body: String,
    },

    /// A response body did not have the expected shape.
    #[error("unexpected {service} response from {url}: {reason}")]
    Decode {
        service: &'static str,
        url: String,
        reason: String,
    },

    /// Missing or invalid settings, detected before any network call.
    #[error("configuration invalid:\n  - {}", .0.join("\n  - "))]
    Config(Vec<String>),

    /// HTTP client could not be built (TLS / CA bundle).
    #[error("HTTP client setup failed: {0}")]
    HttpSetup(#[from] HttpSetupError),

    /// I/O failure on a local file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RoleSyncError {
    /// Map an HTTP failure from `service` onto the error taxonomy.
    ///
    /// 401 and 403 are authentication or permission problems; every other
    /// status is an API rejection; no status at all is a network problem.
    pub fn from_http(service: &'static str, failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Status { status, .. } if status == 401 || status == 403 => Self::Auth {
                service,
                reason: format!("HTTP {status}: check credentials, scope, and permissions"),
            },
            HttpFailure::Status { status, url, body } => Self::Api {
                service,
                status,
                url,
                body,
            },
            HttpFailure::Transport { url, message } => {
                Self::Network(format!("{service} unreachable at {url}: {message}"))
            }
        }
    }

    /// Same as [`RoleSyncError::from_http`] for a retried call.
    pub fn from_retry(service: &'static str, err: RetryError<HttpFailure>) -> Self {
        let attempts = err.attempts();
        match Self::from_http(service, err.into_inner()) {
            Self::Network(msg) if attempts > 1 => {
                Self::Network(format!("{msg} (after {attempts} attempts)"))
            }
            other => other,
        }
    }

    pub(crate) fn decode(service: &'static str, url: &str, reason: impl ToString) -> Self {
        Self::Decode {
            service,
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience constructor for [`RoleSyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RoleSyncError {
    RoleSyncError::Io {
        path: path.into(),
        source,
    }
}
