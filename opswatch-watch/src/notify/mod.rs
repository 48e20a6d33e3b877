//! Notification channels and their dispatch.
//!
//! Each enabled channel gets its own retry budget. A channel that keeps
//! failing is reported in its [`ChannelReport`] and never stops the other
//! channels from being tried.

pub mod email;
pub mod message;
pub mod slack;

use thiserror::Error;

use opswatch_core::{RetryPolicy, Sleeper, Transient};

use crate::error::WatchError;

pub use email::EmailChannel;
pub use message::{Announcement, MessageRenderer, RenderedMessage};
pub use slack::SlackChannel;

/// One failed delivery attempt. The message is already free of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeliveryFailure {
    pub message: String,
    pub transient: bool,
}

impl DeliveryFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl Transient for DeliveryFailure {
    fn is_transient(&self) -> bool {
        self.transient
    }
}

/// A way of telling people about a new version.
pub trait NotificationChannel {
    fn name(&self) -> &'static str;
    fn deliver(&self, message: &RenderedMessage) -> Result<(), DeliveryFailure>;
}

/// How delivery went for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: &'static str,
    pub attempts: u32,
    pub error: Option<String>,
}

impl ChannelReport {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }

    pub fn to_error(&self) -> Option<WatchError> {
        self.error
            .as_ref()
            .map(|message| WatchError::NotificationDelivery {
                channel: self.channel,
                message: message.clone(),
            })
    }
}

/// Deliver `message` on every channel in order.
pub fn dispatch(
    channels: &[Box<dyn NotificationChannel + '_>],
    message: &RenderedMessage,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Vec<ChannelReport> {
    channels
        .iter()
        .map(|channel| {
            let name = channel.name();
            let mut attempts = 0;
            let result = policy.run_with(sleeper, name, |attempt| {
                attempts = attempt;
                channel.deliver(message)
            });
            match result {
                Ok(()) => {
                    tracing::info!(channel = name, attempts, "notification sent");
                    ChannelReport {
                        channel: name,
                        attempts,
                        error: None,
                    }
                }
                Err(err) => {
                    let error = err.into_inner().message;
                    tracing::error!(
                        channel = name,
                        attempts,
                        error = %error,
                        "notification failed"
                    );
                    ChannelReport {
                        channel: name,
                        attempts,
                        error: Some(error),
                    }
                }
            }
        })
        .collect()
}
