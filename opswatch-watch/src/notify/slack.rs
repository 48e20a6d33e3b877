//! Slack incoming-webhook delivery.

use serde_json::json;

use opswatch_core::{HttpFailure, Secret, Transient};

use crate::notify::{DeliveryFailure, NotificationChannel, RenderedMessage};

/// Stand-in for the webhook URL in anything that gets logged.
const REDACTED: &str = "<slack-webhook>";

pub struct SlackChannel {
    agent: ureq::Agent,
    webhook: Secret,
}

impl SlackChannel {
    pub fn new(agent: ureq::Agent, webhook: Secret) -> Self {
        Self { agent, webhook }
    }
}

impl NotificationChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn deliver(&self, message: &RenderedMessage) -> Result<(), DeliveryFailure> {
        self.agent
            .post(self.webhook.expose())
            .send_json(json!({ "text": message.slack_text }))
            .map(|_| ())
            .map_err(|e| to_delivery_failure(HttpFailure::from(e), &self.webhook))
    }
}

/// The webhook URL is itself the credential, so it is scrubbed from the
/// failure text.
fn to_delivery_failure(failure: HttpFailure, webhook: &Secret) -> DeliveryFailure {
    let transient = failure.is_transient();
    let message = match &failure {
        HttpFailure::Status { status, body, .. } => format!("Slack returned HTTP {status}: {body}"),
        HttpFailure::Transport { message, .. } => format!("Slack request failed: {message}"),
    };
    let message = if webhook.is_empty() {
        message
    } else {
        message.replace(webhook.expose(), REDACTED)
    };
    DeliveryFailure { message, transient }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOOK: &str = "https://hooks.slack.com/services/T000/B000/secret-token";

    #[test]
    fn transport_failure_is_transient_and_redacted() {
        let failure = HttpFailure::Transport {
            url: HOOK.into(),
            message: format!("{HOOK}: Connection Failed: connection refused"),
        };
        let delivery = to_delivery_failure(failure, &Secret::from(HOOK));
        assert!(delivery.transient);
        assert!(!delivery.message.contains("secret-token"));
        assert!(delivery.message.contains(REDACTED));
    }

    #[test]
    fn client_error_is_permanent() {
        let failure = HttpFailure::Status {
            status: 404,
            url: HOOK.into(),
            body: "no_service".into(),
        };
        let delivery = to_delivery_failure(failure, &Secret::from(HOOK));
        assert!(!delivery.transient);
        assert_eq!(delivery.message, "Slack returned HTTP 404: no_service");
    }

    #[test]
    fn server_error_is_retried() {
        let failure = HttpFailure::Status {
            status: 503,
            url: HOOK.into(),
            body: String::new(),
        };
        assert!(to_delivery_failure(failure, &Secret::from(HOOK)).transient);
    }
}
