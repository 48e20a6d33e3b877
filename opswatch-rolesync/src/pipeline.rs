//! Role-sync pipeline entrypoints.
//!
//! [`run`] is the pure orchestration over the [`TeamSource`] and
//! [`RoleMappingStore`] seams; [`sync`] builds the production clients from a
//! [`RoleSyncConfig`] and calls it.

use std::path::PathBuf;

use opswatch_core::build_agent;

use crate::checkmarx::CheckmarxClient;
use crate::config::RoleSyncConfig;
use crate::conflict_log::{ConflictLogger, DEFAULT_ERROR_LOG};
use crate::elastic::{ElasticClient, RoleMappingStore};
use crate::error::RoleSyncError;
use crate::resolver::{self, Conflict, Resolution};
use crate::role_template::RoleTemplate;
use crate::team::TeamSource;
use crate::writer::{RoleMappingWriter, TeamWriteResult, WriteOutcome};

/// Behaviour switches for a run.
#[derive(Debug, Clone)]
pub struct RoleSyncOptions {
    /// Restrict the run to these short names.
    pub teams: Option<Vec<String>>,
    pub create_roles: bool,
    pub dry_run: bool,
    pub error_log: PathBuf,
    pub template: RoleTemplate,
}

impl Default for RoleSyncOptions {
    fn default() -> Self {
        Self {
            teams: None,
            create_roles: false,
            dry_run: false,
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            template: RoleTemplate::default(),
        }
    }
}

/// What a run did, team by team.
#[derive(Debug, Clone, Default)]
pub struct RoleSyncReport {
    pub teams_fetched: usize,
    pub results: Vec<TeamWriteResult>,
    pub conflicts: Vec<Conflict>,
    /// `--teams` entries that matched nothing.
    pub unmatched_filters: Vec<String>,
    pub dry_run: bool,
}

impl RoleSyncReport {
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failure())
    }

    pub fn count(&self, pred: impl Fn(&WriteOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Fetch, resolve, and write every team.
///
/// Fails only when the team tree cannot be fetched; per-team write failures
/// are collected in the report.
pub fn run(
    source: &dyn TeamSource,
    store: &dyn RoleMappingStore,
    options: &RoleSyncOptions,
) -> Result<RoleSyncReport, RoleSyncError> {
    if options.dry_run {
        tracing::info!("DRY RUN MODE - no changes will be made");
    }
    tracing::info!("starting team membership sync");

    let teams = source.fetch_teams()?;
    let only = options.teams.as_deref();
    let unmatched_filters: Vec<String> = only
        .map(|names| resolver::unmatched_filters(&teams, names))
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect();
    for name in &unmatched_filters {
        tracing::warn!(team = %name, "requested team not found in Checkmarx");
    }

    let logger = ConflictLogger::new(&options.error_log, !options.dry_run);
    let writer = RoleMappingWriter::new(
        store,
        &options.template,
        options.create_roles,
        options.dry_run,
    );

    let mut report = RoleSyncReport {
        teams_fetched: teams.len(),
        unmatched_filters,
        dry_run: options.dry_run,
        ..RoleSyncReport::default()
    };

    for resolution in resolver::resolve(&teams, only) {
        match resolution {
            Resolution::Conflicted(conflict) => {
                logger.record_conflict(&conflict);
                report.conflicts.push(conflict);
            }
            Resolution::Resolved(role) => {
                tracing::info!(team = %role.path, role = %role.short_name, "processing team");
                let result = writer.write(&role);
                if let WriteOutcome::Failed { error } = &result.outcome {
                    logger.record_failure(&result.short_name, error);
                }
                report.results.push(result);
            }
        }
    }

    tracing::info!(
        successful = report.count(|o| matches!(
            o,
            WriteOutcome::Updated { .. }
                | WriteOutcome::Created { .. }
                | WriteOutcome::WouldUpdate { .. }
                | WriteOutcome::WouldCreate { .. }
        )),
        failed = report.count(WriteOutcome::is_failure),
        conflicts = report.conflicts.len(),
        "sync complete"
    );
    Ok(report)
}

/// Validate `config`, connect to both services, and run the sync.
///
/// Configuration problems are reported before any network call.
pub fn sync(config: &RoleSyncConfig) -> Result<RoleSyncReport, RoleSyncError> {
    config.validate()?;

    let cx_agent = build_agent(&config.checkmarx_http())?;
    let es_agent = build_agent(&config.elastic_http())?;

    let checkmarx = CheckmarxClient::authenticate(cx_agent, &config.checkmarx, config.retry)?;
    let elastic = ElasticClient::new(es_agent, &config.elastic, config.retry);

    run(&checkmarx, &elastic, &config.options)
}
