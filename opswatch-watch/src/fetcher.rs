//! Release-page fetching with bounded retry.

use opswatch_core::{HttpFailure, RetryPolicy, Sleeper, ThreadSleeper};

use crate::error::WatchError;

/// Raw page download. One call is one attempt; retrying is the caller's job.
pub trait PageSource {
    fn get_text(&self, url: &str) -> Result<String, HttpFailure>;
}

/// [`PageSource`] over a blocking `ureq` agent.
pub struct HttpPageSource {
    agent: ureq::Agent,
}

impl HttpPageSource {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl PageSource for HttpPageSource {
    fn get_text(&self, url: &str) -> Result<String, HttpFailure> {
        let response = self.agent.get(url).call()?;
        response.into_string().map_err(|e| HttpFailure::Transport {
            url: url.to_string(),
            message: format!("failed to read body: {e}"),
        })
    }
}

/// Applies a [`RetryPolicy`] to a [`PageSource`].
pub struct PageFetcher<'a> {
    source: &'a dyn PageSource,
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> PageFetcher<'a> {
    pub fn new(source: &'a dyn PageSource, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            sleeper: &ThreadSleeper,
        }
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Page body as text. Timeouts, connection errors and 5xx are retried;
    /// anything else fails at once.
    pub fn fetch(&self, url: &str) -> Result<String, WatchError> {
        tracing::info!(url, "fetching release page");
        self.policy
            .run_with(self.sleeper, "fetch release page", |_| self.source.get_text(url))
            .map_err(|err| WatchError::Fetch {
                url: url.to_string(),
                attempts: err.attempts(),
                reason: err.into_inner().to_string(),
            })
    }
}
