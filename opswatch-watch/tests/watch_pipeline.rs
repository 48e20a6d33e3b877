//! End-to-end version-watch behaviour against an in-memory page source and
//! notification channels.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use opswatch_core::{HttpFailure, RetryPolicy, Sleeper};
use opswatch_watch::notify::RenderedMessage;
use opswatch_watch::{
    pipeline, DeliveryFailure, NotificationChannel, PageSource, WatchConfig, WatchError,
    WatchOutcome, WatchTarget,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakePage {
    responses: RefCell<VecDeque<Result<String, HttpFailure>>>,
    calls: Cell<u32>,
}

impl FakePage {
    fn serving(body: &str) -> Self {
        Self::scripted(vec![Ok(body.to_string())])
    }

    fn scripted(responses: Vec<Result<String, HttpFailure>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: Cell::new(0),
        }
    }
}

impl PageSource for FakePage {
    fn get_text(&self, url: &str) -> Result<String, HttpFailure> {
        self.calls.set(self.calls.get() + 1);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(HttpFailure::Transport {
                    url: url.to_string(),
                    message: "script exhausted".into(),
                })
            })
    }
}

#[derive(Default)]
struct RecordingChannel {
    fail_with: Option<DeliveryFailure>,
    sent: RefCell<Vec<RenderedMessage>>,
    attempts: Cell<u32>,
}

impl RecordingChannel {
    fn failing(failure: DeliveryFailure) -> Self {
        Self {
            fail_with: Some(failure),
            ..Self::default()
        }
    }
}

struct Named<'a>(&'static str, &'a RecordingChannel);

impl NotificationChannel for Named<'_> {
    fn name(&self) -> &'static str {
        self.0
    }

    fn deliver(&self, message: &RenderedMessage) -> Result<(), DeliveryFailure> {
        self.1.attempts.set(self.1.attempts.get() + 1);
        match &self.1.fail_with {
            Some(failure) => Err(failure.clone()),
            None => {
                self.1.sent.borrow_mut().push(message.clone());
                Ok(())
            }
        }
    }
}

#[derive(Default)]
struct RecordingSleeper(RefCell<Vec<Duration>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.0.borrow_mut().push(delay);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const NGINX_PAGE: &str = r#"
<h4>Mainline version</h4><a href="/download/nginx-1.27.0.tar.gz">nginx-1.27.0</a>
<h4>Stable version</h4><a href="/download/nginx-1.3.0.tar.gz">nginx-1.3.0</a>
"#;

fn config(dir: &Path, dry_run: bool) -> WatchConfig {
    let mut cfg = WatchConfig::new(WatchTarget::Nginx);
    cfg.page_url = "https://nginx.example.test/en/download.html".into();
    cfg.version_file = dir.join("nginx_last_version.txt");
    cfg.email.enabled = true;
    cfg.dry_run = dry_run;
    cfg
}

fn stored(cfg: &WatchConfig) -> Option<String> {
    std::fs::read_to_string(&cfg.version_file).ok()
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[test]
fn first_run_records_version_and_stays_quiet() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), false);
    let email = RecordingChannel::default();
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![Box::new(Named("email", &email))];

    let report = pipeline::run(
        &cfg,
        &FakePage::serving(NGINX_PAGE),
        &channels,
        &RecordingSleeper::default(),
    )
    .unwrap();

    assert_eq!(
        report.outcome,
        WatchOutcome::FirstRunSuppressed {
            version: "1.3.0".into()
        }
    );
    assert!(report.persisted);
    assert!(report.succeeded());
    assert_eq!(email.attempts.get(), 0);
    assert_eq!(stored(&cfg).as_deref(), Some("1.3.0"));
}

#[test]
fn unchanged_version_neither_notifies_nor_writes() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), false);
    std::fs::write(&cfg.version_file, "1.3.0\n").unwrap();
    let email = RecordingChannel::default();
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![Box::new(Named("email", &email))];

    let report = pipeline::run(
        &cfg,
        &FakePage::serving(NGINX_PAGE),
        &channels,
        &RecordingSleeper::default(),
    )
    .unwrap();

    assert!(matches!(report.outcome, WatchOutcome::Unchanged { .. }));
    assert!(!report.persisted);
    assert_eq!(email.attempts.get(), 0);
    assert_eq!(stored(&cfg).as_deref(), Some("1.3.0\n"));
}

#[test]
fn change_notifies_once_and_advances_the_file() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), false);
    std::fs::write(&cfg.version_file, "1.2.3").unwrap();
    let email = RecordingChannel::default();
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![Box::new(Named("email", &email))];

    let report = pipeline::run(
        &cfg,
        &FakePage::serving(NGINX_PAGE),
        &channels,
        &RecordingSleeper::default(),
    )
    .unwrap();

    assert!(report.succeeded());
    assert!(report.persisted);
    assert_eq!(email.attempts.get(), 1);
    let sent = email.sent.borrow();
    assert_eq!(sent[0].subject, "New nginx (stable) version detected: 1.3.0");
    assert!(sent[0].body.contains("Previous version: 1.2.3"));
    assert!(sent[0].body.contains("https://nginx.example.test/en/download.html"));
    assert_eq!(stored(&cfg).as_deref(), Some("1.3.0"));
}

#[test]
fn failed_delivery_still_advances_the_file() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), false);
    std::fs::write(&cfg.version_file, "1.2.3").unwrap();
    let email = RecordingChannel::failing(DeliveryFailure::permanent("535 authentication failed"));
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![Box::new(Named("email", &email))];

    let report = pipeline::run(
        &cfg,
        &FakePage::serving(NGINX_PAGE),
        &channels,
        &RecordingSleeper::default(),
    )
    .unwrap();

    assert_eq!(email.attempts.get(), 1);
    assert!(!report.succeeded());
    assert_eq!(report.failed_deliveries()[0].channel, "email");
    assert!(report.persisted);
    assert_eq!(stored(&cfg).as_deref(), Some("1.3.0"));
}

#[test]
fn one_failing_channel_does_not_stop_the_other() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), false);
    cfg.slack.enabled = true;
    std::fs::write(&cfg.version_file, "1.2.3").unwrap();
    let email = RecordingChannel::default();
    let slack = RecordingChannel::failing(DeliveryFailure::transient("HTTP 503"));
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![
        Box::new(Named("email", &email)),
        Box::new(Named("slack", &slack)),
    ];
    let sleeper = RecordingSleeper::default();

    let report = pipeline::run(&cfg, &FakePage::serving(NGINX_PAGE), &channels, &sleeper).unwrap();

    assert_eq!(email.sent.borrow().len(), 1);
    assert_eq!(slack.attempts.get(), 3);
    assert_eq!(
        *sleeper.0.borrow(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
    let failed = report.failed_deliveries();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].channel, "slack");
    assert_eq!(stored(&cfg).as_deref(), Some("1.3.0"));
}

// ---------------------------------------------------------------------------
// Dry-run
// ---------------------------------------------------------------------------

#[test]
fn dry_run_change_sends_and_saves_nothing() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), true);
    std::fs::write(&cfg.version_file, "1.2.3").unwrap();
    let email = RecordingChannel::default();
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![Box::new(Named("email", &email))];

    let report = pipeline::run(
        &cfg,
        &FakePage::serving(NGINX_PAGE),
        &channels,
        &RecordingSleeper::default(),
    )
    .unwrap();

    assert!(report.dry_run);
    assert!(!report.persisted);
    assert!(report.succeeded());
    assert_eq!(email.attempts.get(), 0);
    assert_eq!(stored(&cfg).as_deref(), Some("1.2.3"));
}

#[test]
fn dry_run_first_run_does_not_create_the_file() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), true);

    let report = pipeline::run(
        &cfg,
        &FakePage::serving(NGINX_PAGE),
        &[],
        &RecordingSleeper::default(),
    )
    .unwrap();

    assert!(matches!(report.outcome, WatchOutcome::FirstRunSuppressed { .. }));
    assert!(!report.persisted);
    assert!(!cfg.version_file.exists());
}

// ---------------------------------------------------------------------------
// Fetch and extraction failures
// ---------------------------------------------------------------------------

#[test]
fn transient_fetch_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), false);
    let page = FakePage::scripted(vec![
        Err(HttpFailure::Transport {
            url: cfg.page_url.clone(),
            message: "timed out".into(),
        }),
        Err(HttpFailure::Status {
            status: 502,
            url: cfg.page_url.clone(),
            body: String::new(),
        }),
        Ok(NGINX_PAGE.to_string()),
    ]);

    let report = pipeline::run(&cfg, &page, &[], &RecordingSleeper::default()).unwrap();

    assert_eq!(page.calls.get(), 3);
    assert!(matches!(report.outcome, WatchOutcome::FirstRunSuppressed { .. }));
}

#[test]
fn exhausted_fetch_fails_without_touching_state() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), false);
    cfg.retry = RetryPolicy {
        max_attempts: 2,
        ..RetryPolicy::default()
    };
    std::fs::write(&cfg.version_file, "1.2.3").unwrap();
    let page = FakePage::scripted(vec![]);
    let email = RecordingChannel::default();
    let channels: Vec<Box<dyn NotificationChannel + '_>> = vec![Box::new(Named("email", &email))];

    let err = pipeline::run(&cfg, &page, &channels, &RecordingSleeper::default()).unwrap_err();

    assert!(matches!(err, WatchError::Fetch { attempts: 2, .. }));
    assert_eq!(email.attempts.get(), 0);
    assert_eq!(stored(&cfg).as_deref(), Some("1.2.3"));
}

#[test]
fn page_without_version_is_reported() {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path(), false);
    let page = FakePage::serving("<h4>Stable version</h4><p>coming soon</p>");

    let err = pipeline::run(&cfg, &page, &[], &RecordingSleeper::default()).unwrap_err();

    assert!(matches!(err, WatchError::NoVersionFound { .. }));
    assert!(!cfg.version_file.exists());
}

#[test]
fn sonatype_picks_the_highest_release_number() {
    let dir = TempDir::new().unwrap();
    let mut cfg = WatchConfig::new(WatchTarget::Sonatype);
    cfg.page_url = "https://help.example.test/iq".into();
    cfg.version_file = dir.path().join("sonatype_last_version.txt");
    let page = FakePage::serving("<h2>Release 188</h2><h2>Release 190</h2><h2>Release 189</h2>");

    let report = pipeline::run(&cfg, &page, &[], &RecordingSleeper::default()).unwrap();

    assert_eq!(
        report.outcome,
        WatchOutcome::FirstRunSuppressed {
            version: "190".into()
        }
    );
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn watch_rejects_config_without_channels_before_fetching() {
    let dir = TempDir::new().unwrap();
    let mut cfg = WatchConfig::new(WatchTarget::Sonatype);
    // Unroutable: any network attempt would surface as a Fetch error.
    cfg.page_url = "http://127.0.0.1:9/".into();
    cfg.version_file = dir.path().join("v.txt");

    let err = pipeline::watch(&cfg).unwrap_err();

    assert!(matches!(err, WatchError::ConfigValidation(_)));
    assert!(!cfg.version_file.exists());
}
