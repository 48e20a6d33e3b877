//! Immutable version-watch configuration.
//!
//! The CLI layers built-in defaults, a `.env` file, environment variables
//! and command-line flags (lowest to highest) and hands the result over as a
//! [`WatchConfig`]. Nothing here reads the environment.

use std::path::PathBuf;
use std::time::Duration;

use opswatch_core::{http::DEFAULT_TIMEOUT, HttpOptions, RetryPolicy, Secret};

use crate::error::WatchError;
use crate::notify::email::{parse_mailbox, parse_recipients};
use crate::target::WatchTarget;

pub const DEFAULT_SMTP_SERVER: &str = "smtp.office365.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
/// Every Slack incoming-webhook URL starts with this.
pub const SLACK_WEBHOOK_PREFIX: &str = "https://hooks.slack.com/";

/// SMTP notification settings.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub from: Option<String>,
    /// One address or a comma-separated list.
    pub to: Option<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

/// Slack incoming-webhook settings.
#[derive(Debug, Clone, Default)]
pub struct SlackSettings {
    pub enabled: bool,
    pub webhook: Option<Secret>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub target: WatchTarget,
    pub page_url: String,
    pub version_file: PathBuf,
    pub email: EmailSettings,
    pub slack: SlackSettings,
    pub dry_run: bool,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl WatchConfig {
    /// Defaults for `target`: its page URL and version file, no channels.
    pub fn new(target: WatchTarget) -> Self {
        Self {
            target,
            page_url: target.page_url().to_string(),
            version_file: PathBuf::from(target.default_version_file()),
            email: EmailSettings::default(),
            slack: SlackSettings::default(),
            dry_run: false,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Names of the enabled channels, in dispatch order.
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.email.enabled {
            names.push("email");
        }
        if self.slack.enabled {
            names.push("slack");
        }
        names
    }

    /// Check the configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), WatchError> {
        let mut errors = Vec::new();

        if self.email.enabled {
            let email = &self.email;
            if is_blank(email.username.as_deref()) {
                errors.push("EMAIL_USERNAME is required when email is enabled".to_string());
            }
            if email.password.as_ref().map_or(true, Secret::is_empty) {
                errors.push("EMAIL_PASSWORD is required when email is enabled".to_string());
            }
            match email.from.as_deref() {
                Some(from) if !from.trim().is_empty() => {
                    if let Err(e) = parse_mailbox(from) {
                        errors.push(format!("EMAIL_FROM is not a valid address: {e}"));
                    }
                }
                _ => errors.push("EMAIL_FROM is required when email is enabled".to_string()),
            }
            match email.to.as_deref() {
                Some(to) if !to.trim().is_empty() => {
                    if let Err(e) = parse_recipients(to) {
                        errors.push(format!("EMAIL_TO is not a valid address list: {e}"));
                    }
                }
                _ => errors.push("EMAIL_TO is required when email is enabled".to_string()),
            }
            if email.smtp_server.trim().is_empty() {
                errors.push("SMTP_SERVER must not be empty".to_string());
            }
        }

        if self.slack.enabled {
            match &self.slack.webhook {
                Some(url) if !url.is_empty() => {
                    if !url.expose().starts_with(SLACK_WEBHOOK_PREFIX) {
                        errors.push("SLACK_WEBHOOK_URL appears to be invalid".to_string());
                    }
                }
                _ => errors.push("SLACK_WEBHOOK_URL is required when Slack is enabled".to_string()),
            }
        }

        if !self.email.enabled && !self.slack.enabled {
            errors.push(
                "At least one notification method must be enabled. Use --enable-email or --enable-slack"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            tracing::info!("configuration validated successfully");
            tracing::info!(
                email = if self.email.enabled { "enabled" } else { "disabled" },
                slack = if self.slack.enabled { "enabled" } else { "disabled" },
                "notification channels"
            );
            Ok(())
        } else {
            Err(WatchError::ConfigValidation(errors))
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: self.timeout,
            user_agent: concat!("opswatch-version-watch/", env!("CARGO_PKG_VERSION")).to_string(),
            ..HttpOptions::default()
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
