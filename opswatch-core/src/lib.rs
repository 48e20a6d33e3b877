//! Opswatch core library: plumbing shared by the role-sync and
//! version-watch pipelines.
//!
//! - [`retry`]: [`RetryPolicy`] and the [`Transient`] classification
//! - [`http`]: blocking `ureq` agent construction and failure capture
//! - [`secret`]: [`Secret`], a credential that never formats its value
//! - [`logging`]: `tracing` subscriber setup for the binary
//! - [`error`]: [`HttpFailure`], [`HttpSetupError`]

pub mod error;
pub mod http;
pub mod logging;
pub mod retry;
pub mod secret;

pub use error::{HttpFailure, HttpSetupError};
pub use http::{build_agent, HttpOptions};
pub use retry::{RetryError, RetryPolicy, Sleeper, ThreadSleeper, Transient};
pub use secret::Secret;
