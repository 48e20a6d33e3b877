//! # opswatch-watch
//!
//! Polls a vendor release-notes page and announces new versions.
//!
//! [`PageFetcher`] downloads the page under the shared retry policy,
//! [`VersionExtractor`] pulls the version out, [`VersionStore`] remembers
//! the last one seen, and [`pipeline::run`] decides between first-run
//! suppression, no-op, and notifying every enabled [`NotificationChannel`].

pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod notify;
pub mod pipeline;
pub mod target;
pub mod version_store;

pub use config::{EmailSettings, SlackSettings, WatchConfig};
pub use error::WatchError;
pub use extractor::{Selection, VersionExtractor};
pub use fetcher::{HttpPageSource, PageFetcher, PageSource};
pub use notify::{ChannelReport, DeliveryFailure, NotificationChannel};
pub use pipeline::{WatchOutcome, WatchReport, WatchState};
pub use target::WatchTarget;
pub use version_store::VersionStore;
