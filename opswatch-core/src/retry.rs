//! Bounded retry with exponential backoff.
//!
//! One [`RetryPolicy`] is applied to every network operation in both
//! pipelines. An operation is attempted up to `max_attempts` times; after
//! failed attempt `n` the policy sleeps `base_delay * multiplier^(n-1)`
//! before trying again. Errors that report themselves as permanent via
//! [`Transient`] stop the sequence immediately.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Classifies an error as worth retrying or not.
pub trait Transient {
    /// `true` when a later attempt may succeed (timeouts, 5xx, dropped
    /// connections); `false` for failures that will repeat (4xx, bad
    /// credentials, malformed payloads).
    fn is_transient(&self) -> bool;
}

/// Blocking sleep between attempts. Abstracted so tests can record delays.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Terminal outcome of a retried operation that never succeeded.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// An attempt failed with an error that retrying cannot fix.
    #[error("failed on attempt {attempt}: {source}")]
    Permanent {
        attempt: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
            Self::Permanent { attempt, .. } => *attempt,
        }
    }

    /// The error from the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Permanent { source, .. } => source,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Permanent { source, .. } => source,
        }
    }
}

/// Attempt count and backoff schedule for network operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay after each further failure.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(exponent))
    }

    /// Run `op` under this policy, sleeping on the current thread.
    pub fn run<T, E, F>(&self, label: &str, op: F) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Transient + 'static,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_with(&ThreadSleeper, label, op)
    }

    /// Run `op` under this policy using `sleeper` between attempts.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run_with<T, E, F>(
        &self,
        sleeper: &dyn Sleeper,
        label: &str,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + Transient + 'static,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(op = label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_transient() => {
                    tracing::debug!(op = label, attempt, error = %err, "permanent failure");
                    return Err(RetryError::Permanent {
                        attempt,
                        source: err,
                    });
                }
                Err(err) if attempt >= max_attempts => {
                    tracing::error!(
                        op = label,
                        attempts = attempt,
                        error = %err,
                        "max retries reached"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        op = label,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempts, {}ms base delay, x{}",
            self.max_attempts,
            self.base_delay.as_millis(),
            self.multiplier
        )
    }
}
