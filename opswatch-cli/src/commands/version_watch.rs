//! `opswatch version-watch` — detect a new vendor release and notify.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, Args};
use colored::Colorize;

use opswatch_core::Secret;
use opswatch_watch::config::{DEFAULT_SMTP_PORT, DEFAULT_SMTP_SERVER};
use opswatch_watch::{
    pipeline, EmailSettings, SlackSettings, WatchConfig, WatchOutcome, WatchReport, WatchTarget,
};

/// Arguments for `opswatch version-watch`.
#[derive(Args, Debug)]
pub struct VersionWatchArgs {
    /// Which release page to watch.
    #[arg(long, env = "WATCH_TARGET", default_value_t = WatchTarget::Sonatype)]
    pub target: WatchTarget,

    /// Override the target's release page URL.
    #[arg(long, env = "PAGE_URL")]
    pub page_url: Option<String>,

    /// File holding the last seen version [default: <target>_last_version.txt]
    #[arg(long, env = "VERSION_FILE")]
    pub version_file: Option<PathBuf>,

    /// Send email notifications. On the command line this beats --disable-email.
    #[arg(
        long,
        env = "ENABLE_EMAIL",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub enable_email: bool,

    /// Turn email off even when ENABLE_EMAIL is set.
    #[arg(long)]
    pub disable_email: bool,

    /// `--enable-email` was typed, not read from the environment.
    #[arg(skip)]
    pub email_on_command_line: bool,

    /// Send Slack notifications. On the command line this beats --disable-slack.
    #[arg(
        long,
        env = "ENABLE_SLACK",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub enable_slack: bool,

    /// Turn Slack off even when ENABLE_SLACK is set.
    #[arg(long)]
    pub disable_slack: bool,

    /// `--enable-slack` was typed, not read from the environment.
    #[arg(skip)]
    pub slack_on_command_line: bool,

    #[arg(long, env = "SMTP_SERVER", default_value = DEFAULT_SMTP_SERVER)]
    pub smtp_server: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    #[arg(long, env = "EMAIL_USERNAME")]
    pub email_username: Option<String>,

    #[arg(long, env = "EMAIL_PASSWORD", hide_env_values = true)]
    pub email_password: Option<Secret>,

    #[arg(long, env = "EMAIL_FROM")]
    pub email_from: Option<String>,

    /// Recipient, or a comma-separated list of recipients.
    #[arg(long, env = "EMAIL_TO")]
    pub email_to: Option<String>,

    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook: Option<Secret>,

    /// Fetch and compare, but send nothing and save nothing.
    #[arg(
        long,
        env = "DRY_RUN",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,
}

impl VersionWatchArgs {
    /// Record which enable flags came from the command line itself.
    pub fn note_command_line(&mut self, matches: &ArgMatches) {
        let typed = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
        self.email_on_command_line = typed("enable_email");
        self.slack_on_command_line = typed("enable_slack");
    }

    pub fn into_config(self) -> WatchConfig {
        let mut config = WatchConfig::new(self.target);
        if let Some(url) = self.page_url {
            config.page_url = url;
        }
        if let Some(path) = self.version_file {
            config.version_file = path;
        }
        config.email = EmailSettings {
            enabled: channel_enabled(
                self.enable_email,
                self.email_on_command_line,
                self.disable_email,
            ),
            smtp_server: self.smtp_server,
            smtp_port: self.smtp_port,
            username: self.email_username,
            password: self.email_password,
            from: self.email_from,
            to: self.email_to,
        };
        config.slack = SlackSettings {
            enabled: channel_enabled(
                self.enable_slack,
                self.slack_on_command_line,
                self.disable_slack,
            ),
            webhook: self.slack_webhook,
        };
        config.dry_run = self.dry_run;
        config
    }

    pub fn run(self) -> Result<ExitCode> {
        let config = self.into_config();
        let report = pipeline::watch(&config)
            .with_context(|| format!("version watch for {} failed", config.target))?;
        print_report(&config, &report);

        if report.succeeded() {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    }
}

/// A typed `--enable-*` wins; otherwise `--disable-*` overrides the
/// environment.
fn channel_enabled(enabled: bool, on_command_line: bool, disabled: bool) -> bool {
    on_command_line || (enabled && !disabled)
}

fn print_report(config: &WatchConfig, report: &WatchReport) {
    let product = config.target.product();
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    match &report.outcome {
        WatchOutcome::FirstRunSuppressed { version } => {
            let action = if report.persisted { "recorded" } else { "would record" };
            println!(
                "{prefix}{} first run: {action} {product} {version}, no notification sent",
                "✓".green()
            );
        }
        WatchOutcome::Unchanged { version } => {
            println!("{} {product} is still at {version}", "✓".green());
        }
        WatchOutcome::Changed {
            previous,
            current,
            deliveries,
        } => {
            println!("{prefix}{} {product} {previous} → {current}", "★".yellow().bold());
            if report.dry_run {
                println!(
                    "[dry-run] would notify via {} and save {current} to {}",
                    config.enabled_channels().join(", "),
                    config.version_file.display()
                );
            }
            for delivery in deliveries {
                match delivery.to_error() {
                    None => println!(
                        "  {} {} ({} attempt(s))",
                        "✓".green(),
                        delivery.channel,
                        delivery.attempts
                    ),
                    Some(err) => println!(
                        "  {} {err} after {} attempt(s)",
                        "✗".red(),
                        delivery.attempts
                    ),
                }
            }
            if report.persisted {
                println!("  saved {current} to {}", config.version_file.display());
            }
        }
    }
}
