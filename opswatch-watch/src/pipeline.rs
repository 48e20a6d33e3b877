//! Version-watch pipeline entrypoints.
//!
//! [`run`] is the orchestration over the [`PageSource`] and
//! [`NotificationChannel`] seams; [`watch`] builds the production page
//! source and channels from a [`WatchConfig`] and calls it.

use chrono::Utc;

use opswatch_core::{build_agent, Sleeper, ThreadSleeper};

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::fetcher::{HttpPageSource, PageFetcher, PageSource};
use crate::notify::{
    self, Announcement, ChannelReport, EmailChannel, MessageRenderer, NotificationChannel,
    SlackChannel,
};
use crate::version_store::VersionStore;

/// What to do with a freshly extracted version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// No prior record: remember the version, tell nobody.
    FirstRunSuppressed,
    /// Same as last time.
    NoOp,
    /// The version moved.
    Notify,
}

impl WatchState {
    pub fn decide(prior: Option<&str>, current: &str) -> Self {
        match prior {
            None => Self::FirstRunSuppressed,
            Some(prior) if prior == current => Self::NoOp,
            Some(_) => Self::Notify,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    FirstRunSuppressed {
        version: String,
    },
    Unchanged {
        version: String,
    },
    Changed {
        previous: String,
        current: String,
        /// Empty in dry-run.
        deliveries: Vec<ChannelReport>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchReport {
    pub outcome: WatchOutcome,
    /// Whether the version file was written this run.
    pub persisted: bool,
    pub dry_run: bool,
}

impl WatchReport {
    pub fn failed_deliveries(&self) -> Vec<&ChannelReport> {
        match &self.outcome {
            WatchOutcome::Changed { deliveries, .. } => {
                deliveries.iter().filter(|d| !d.delivered()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// `false` when any enabled channel failed to deliver.
    pub fn succeeded(&self) -> bool {
        self.failed_deliveries().is_empty()
    }
}

/// Fetch, extract, compare, and notify.
///
/// `config` is expected to be validated already. `channels` are tried in
/// order and each gets the full retry budget. In dry-run nothing is sent and
/// the version file is left alone.
pub fn run(
    config: &WatchConfig,
    source: &dyn PageSource,
    channels: &[Box<dyn NotificationChannel + '_>],
    sleeper: &dyn Sleeper,
) -> Result<WatchReport, WatchError> {
    if config.dry_run {
        tracing::info!("DRY RUN MODE - no notifications will be sent, no state will be saved");
    }

    let extractor = config.target.extractor()?;
    let page = PageFetcher::new(source, config.retry)
        .with_sleeper(sleeper)
        .fetch(&config.page_url)?;
    let current = extractor.extract(&config.page_url, &page)?;
    tracing::info!(target_name = %config.target, version = %current, "current version");

    let store = VersionStore::new(&config.version_file);
    let prior = store.read()?;

    let (outcome, persisted) = match WatchState::decide(prior.as_deref(), &current) {
        WatchState::FirstRunSuppressed => {
            tracing::info!("first run, recording current version without notifying");
            let persisted = persist(&store, &current, config.dry_run)?;
            (WatchOutcome::FirstRunSuppressed { version: current }, persisted)
        }
        WatchState::NoOp => {
            tracing::info!(version = %current, "no new version detected");
            (WatchOutcome::Unchanged { version: current }, false)
        }
        WatchState::Notify => {
            let previous = prior.unwrap_or_default();
            tracing::info!(previous = %previous, current = %current, "new version detected");

            let message = MessageRenderer::new()?.render(&Announcement {
                product: config.target.product().to_string(),
                version: current.clone(),
                previous: Some(previous.clone()),
                page_url: config.page_url.clone(),
                detected_at: Utc::now(),
            })?;

            let deliveries = if config.dry_run {
                let via: Vec<&str> = channels.iter().map(|c| c.name()).collect();
                tracing::info!(channels = %via.join(", "), "[dry-run] would send notification");
                tracing::info!(subject = %message.subject, "[dry-run] email preview");
                tracing::info!(text = %message.slack_text, "[dry-run] slack preview");
                Vec::new()
            } else {
                notify::dispatch(channels, &message, &config.retry, sleeper)
            };

            // Persisted whatever the delivery outcome, so the next run does
            // not alert again for this version.
            let persisted = persist(&store, &current, config.dry_run)?;
            (
                WatchOutcome::Changed {
                    previous,
                    current,
                    deliveries,
                },
                persisted,
            )
        }
    };

    Ok(WatchReport {
        outcome,
        persisted,
        dry_run: config.dry_run,
    })
}

fn persist(store: &VersionStore, version: &str, dry_run: bool) -> Result<bool, WatchError> {
    if dry_run {
        tracing::info!(path = %store.path().display(), version, "[dry-run] would save version");
        return Ok(false);
    }
    store.write(version)?;
    tracing::info!(path = %store.path().display(), version, "saved version");
    Ok(true)
}

/// Build the production page source and channels for `config` and run.
pub fn watch(config: &WatchConfig) -> Result<WatchReport, WatchError> {
    config.validate()?;
    let agent = build_agent(&config.http_options())?;

    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
    if config.email.enabled {
        channels.push(Box::new(EmailChannel::new(&config.email, config.timeout)?));
    }
    if config.slack.enabled {
        if let Some(webhook) = &config.slack.webhook {
            channels.push(Box::new(SlackChannel::new(agent.clone(), webhook.clone())));
        }
    }

    run(config, &HttpPageSource::new(agent), &channels, &ThreadSleeper)
}
