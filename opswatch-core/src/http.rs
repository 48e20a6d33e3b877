//! Blocking HTTP agent construction.
//!
//! Every remote call in opswatch goes through a `ureq::Agent` built here, so
//! timeout, user agent and TLS trust are decided in one place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::HttpSetupError;

/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for [`build_agent`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Applied to each whole request (connect + read).
    pub timeout: Duration,
    pub user_agent: String,
    /// When `false`, server certificates and host names are not checked.
    pub verify_tls: bool,
    /// Extra PEM root certificate to trust.
    pub ca_cert: Option<PathBuf>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("opswatch/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_tls: true,
            ca_cert: None,
        }
    }
}

/// Build a `ureq::Agent` honouring `opts`.
pub fn build_agent(opts: &HttpOptions) -> Result<ureq::Agent, HttpSetupError> {
    let mut tls = native_tls::TlsConnector::builder();
    if !opts.verify_tls {
        tracing::warn!("TLS certificate verification is disabled");
        tls.danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    if let Some(path) = &opts.ca_cert {
        let pem = std::fs::read(path).map_err(|source| HttpSetupError::CaCertRead {
            path: path.clone(),
            source,
        })?;
        tls.add_root_certificate(native_tls::Certificate::from_pem(&pem)?);
    }
    let connector = tls.build()?;

    Ok(ureq::AgentBuilder::new()
        .timeout(opts.timeout)
        .user_agent(&opts.user_agent)
        .tls_connector(Arc::new(connector))
        .build())
}
