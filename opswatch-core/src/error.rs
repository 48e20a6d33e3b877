//! Error types for opswatch-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::retry::Transient;

/// Longest response body excerpt kept in an [`HttpFailure::Status`].
const BODY_EXCERPT_LIMIT: usize = 512;

/// A failed HTTP exchange, detached from the `ureq` response so it can be
/// stored, retried, and logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpFailure {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl HttpFailure {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } => None,
        }
    }
}

impl Transient for HttpFailure {
    fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Transport { .. } => true,
        }
    }
}

impl From<ureq::Error> for HttpFailure {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let url = response.get_url().to_string();
                let mut body = response.into_string().unwrap_or_default();
                if body.len() > BODY_EXCERPT_LIMIT {
                    let mut cut = BODY_EXCERPT_LIMIT;
                    while !body.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    body.truncate(cut);
                    body.push('…');
                }
                Self::Status { status, url, body }
            }
            ureq::Error::Transport(transport) => Self::Transport {
                url: transport
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
                message: transport_message(&transport),
            },
        }
    }
}

/// Describes a transport failure without its URL; `Display` adds that once.
fn transport_message(transport: &ureq::Transport) -> String {
    let mut message = transport.kind().to_string();
    if let Some(detail) = transport.message() {
        message.push_str(": ");
        message.push_str(detail);
    }
    if let Some(source) = std::error::Error::source(transport) {
        message.push_str(": ");
        message.push_str(&source.to_string());
    }
    message
}

/// Errors raised while building an HTTP agent.
#[derive(Debug, Error)]
pub enum HttpSetupError {
    /// The configured CA bundle could not be read.
    #[error("failed to read CA certificate at {path}: {source}")]
    CaCertRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TLS connector rejected the configuration or certificate.
    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] native_tls::Error),
}
