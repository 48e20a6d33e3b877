//! `opswatch role-sync` — mirror Checkmarx teams into Elasticsearch role
//! mappings.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use opswatch_core::Secret;
use opswatch_rolesync::{
    conflict_log::DEFAULT_ERROR_LOG, pipeline, CheckmarxConfig, ElasticConfig, RoleSyncConfig,
    RoleSyncOptions, RoleSyncReport, RoleTemplate, TeamWriteResult, WriteOutcome,
};

/// Arguments for `opswatch role-sync`.
///
/// Connection settings are optional at the clap level so that every missing
/// value is reported together by config validation.
#[derive(Args, Debug)]
pub struct RoleSyncArgs {
    /// Checkmarx base URL.
    #[arg(long, env = "CX_URL")]
    pub cx_url: Option<String>,

    #[arg(long, env = "CX_USERNAME")]
    pub cx_user: Option<String>,

    #[arg(long, env = "CX_PASSWORD", hide_env_values = true)]
    pub cx_password: Option<Secret>,

    /// Elasticsearch base URL.
    #[arg(long, env = "ES_URL")]
    pub es_url: Option<String>,

    #[arg(long, env = "ES_USERNAME")]
    pub es_user: Option<String>,

    #[arg(long, env = "ES_PASSWORD", hide_env_values = true)]
    pub es_password: Option<Secret>,

    /// Verify the Elasticsearch TLS certificate.
    #[arg(
        long,
        env = "ES_VERIFY_SSL",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        value_name = "BOOL"
    )]
    pub es_verify_ssl: bool,

    /// PEM file with an extra trusted root for Elasticsearch.
    #[arg(long, env = "ES_CA_CERT")]
    pub es_ca_cert: Option<PathBuf>,

    /// Only sync these teams (by short name).
    #[arg(long, num_args = 1.., value_name = "NAME")]
    pub teams: Option<Vec<String>>,

    /// Create missing roles and role mappings instead of failing.
    #[arg(long)]
    pub create_roles: bool,

    /// Index pattern granted by roles created with `--create-roles`.
    #[arg(long = "index-pattern", value_name = "PATTERN", default_value = "checkmarx-*")]
    pub index_patterns: Vec<String>,

    /// File receiving conflict and write-failure records.
    #[arg(long, env = "SYNC_ERROR_LOG", default_value = DEFAULT_ERROR_LOG)]
    pub error_log: PathBuf,

    /// Show what would change without writing anything.
    #[arg(
        long,
        env = "DRY_RUN",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,
}

impl RoleSyncArgs {
    pub fn into_config(self) -> RoleSyncConfig {
        let template = RoleTemplate {
            index_patterns: self.index_patterns,
            ..RoleTemplate::default()
        };
        RoleSyncConfig::new(
            CheckmarxConfig {
                url: self.cx_url.unwrap_or_default(),
                username: self.cx_user.unwrap_or_default(),
                password: self.cx_password.unwrap_or_default(),
            },
            ElasticConfig {
                url: self.es_url.unwrap_or_default(),
                username: self.es_user.unwrap_or_default(),
                password: self.es_password.unwrap_or_default(),
                verify_tls: self.es_verify_ssl,
                ca_cert: self.es_ca_cert,
            },
            RoleSyncOptions {
                teams: self.teams,
                create_roles: self.create_roles,
                dry_run: self.dry_run,
                error_log: self.error_log,
                template,
            },
        )
    }

    pub fn run(self) -> Result<ExitCode> {
        let config = self.into_config();
        let report = pipeline::sync(&config).context("role sync failed")?;
        print_report(&report);

        if report.has_failures() {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct TeamRow {
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "users")]
    users: usize,
    #[tabled(rename = "action")]
    action: String,
}

fn print_report(report: &RoleSyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    for conflict in &report.conflicts {
        let paths: Vec<&str> = conflict.paths.iter().map(|p| p.0.as_str()).collect();
        println!(
            "{} role '{}' is claimed by {} teams, skipped: {}",
            "conflict:".yellow().bold(),
            conflict.short_name,
            paths.len(),
            paths.join(", ")
        );
    }
    for name in &report.unmatched_filters {
        println!("{} team '{name}' not found in Checkmarx", "warning:".yellow().bold());
    }

    if report.dry_run {
        for result in &report.results {
            print_dry_run_detail(result);
        }
    }

    if !report.results.is_empty() {
        let rows: Vec<TeamRow> = report
            .results
            .iter()
            .map(|r| TeamRow {
                role: r.short_name.clone(),
                users: r.member_count,
                action: describe(&r.outcome),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    let updated = report.count(|o| {
        matches!(o, WriteOutcome::Updated { .. } | WriteOutcome::WouldUpdate { .. })
    });
    let created = report.count(|o| {
        matches!(o, WriteOutcome::Created { .. } | WriteOutcome::WouldCreate { .. })
    });
    let skipped = report.count(|o| matches!(o, WriteOutcome::Skipped { .. }));
    let failed = report.count(WriteOutcome::is_failure);

    let summary = format!(
        "{prefix}{} teams fetched | {updated} updated | {created} created | {skipped} skipped | {failed} failed | {} conflicts",
        report.teams_fetched,
        report.conflicts.len(),
    );
    if failed > 0 {
        println!("{} {summary}", "✗".red());
    } else {
        println!("{} {summary}", "✓".green());
    }
}

fn print_dry_run_detail(result: &TeamWriteResult) {
    if matches!(result.outcome, WriteOutcome::Skipped { .. }) {
        return;
    }
    println!(
        "[dry-run] {} ({} users): {}",
        result.short_name.bold(),
        result.member_count,
        result.members.join(", ")
    );
    if let WriteOutcome::WouldUpdate { added, removed } = &result.outcome {
        for user in added {
            println!("  {} {user}", "+".green());
        }
        for user in removed {
            println!("  {} {user}", "-".red());
        }
    }
}

fn describe(outcome: &WriteOutcome) -> String {
    match outcome {
        WriteOutcome::Updated { added, removed } => {
            format!("updated (+{} -{})", added.len(), removed.len())
        }
        WriteOutcome::WouldUpdate { added, removed } => {
            format!("would update (+{} -{})", added.len(), removed.len())
        }
        WriteOutcome::Created { role_created: true } => "created role + mapping".to_string(),
        WriteOutcome::Created { role_created: false } => "created mapping".to_string(),
        WriteOutcome::WouldCreate { role_created: true } => {
            "would create role + mapping".to_string()
        }
        WriteOutcome::WouldCreate { role_created: false } => "would create mapping".to_string(),
        WriteOutcome::Skipped { reason } => format!("skipped: {reason}"),
        WriteOutcome::Failed { error } => format!("failed: {error}"),
    }
}
