//! Immutable run configuration, assembled once by the CLI.

use std::path::PathBuf;
use std::time::Duration;

use opswatch_core::{http::DEFAULT_TIMEOUT, HttpOptions, RetryPolicy, Secret};

use crate::error::RoleSyncError;
use crate::pipeline::RoleSyncOptions;

/// Checkmarx SAST endpoint and account.
#[derive(Debug, Clone)]
pub struct CheckmarxConfig {
    pub url: String,
    pub username: String,
    pub password: Secret,
}

/// Elasticsearch endpoint, account, and TLS trust.
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub url: String,
    pub username: String,
    pub password: Secret,
    pub verify_tls: bool,
    pub ca_cert: Option<PathBuf>,
}

/// Everything a role-sync run needs.
#[derive(Debug, Clone)]
pub struct RoleSyncConfig {
    pub checkmarx: CheckmarxConfig,
    pub elastic: ElasticConfig,
    pub options: RoleSyncOptions,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl RoleSyncConfig {
    pub fn new(
        checkmarx: CheckmarxConfig,
        elastic: ElasticConfig,
        options: RoleSyncOptions,
    ) -> Self {
        Self {
            checkmarx,
            elastic,
            options,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Check every required setting, reporting all problems at once.
    pub fn validate(&self) -> Result<(), RoleSyncError> {
        let mut problems = Vec::new();
        check_endpoint(&mut problems, "--cx-url", &self.checkmarx.url);
        check_present(&mut problems, "--cx-user", &self.checkmarx.username);
        if self.checkmarx.password.is_empty() {
            problems.push("--cx-password is required".to_string());
        }
        check_endpoint(&mut problems, "--es-url", &self.elastic.url);
        check_present(&mut problems, "--es-user", &self.elastic.username);
        if self.elastic.password.is_empty() {
            problems.push("--es-password is required".to_string());
        }
        if let Some(ca) = &self.elastic.ca_cert {
            if !ca.is_file() {
                problems.push(format!("--es-ca-cert {} does not exist", ca.display()));
            }
        }
        if let Some(teams) = &self.options.teams {
            if teams.is_empty() {
                problems.push("--teams needs at least one name".to_string());
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RoleSyncError::Config(problems))
        }
    }

    pub fn checkmarx_http(&self) -> HttpOptions {
        HttpOptions {
            timeout: self.timeout,
            ..HttpOptions::default()
        }
    }

    pub fn elastic_http(&self) -> HttpOptions {
        HttpOptions {
            timeout: self.timeout,
            verify_tls: self.elastic.verify_tls,
            ca_cert: self.elastic.ca_cert.clone(),
            ..HttpOptions::default()
        }
    }
}

fn check_present(problems: &mut Vec<String>, flag: &str, value: &str) {
    if value.trim().is_empty() {
        problems.push(format!("{flag} is required"));
    }
}

fn check_endpoint(problems: &mut Vec<String>, flag: &str, value: &str) {
    if value.trim().is_empty() {
        problems.push(format!("{flag} is required"));
    } else if !(value.starts_with("http://") || value.starts_with("https://")) {
        problems.push(format!("{flag} must start with http:// or https:// (got '{value}')"));
    }
}
