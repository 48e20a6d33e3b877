//! SMTP delivery via `lettre` with STARTTLS.

use std::time::Duration;

use lettre::address::AddressError;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::EmailSettings;
use crate::error::WatchError;
use crate::notify::{DeliveryFailure, NotificationChannel, RenderedMessage};

const CHANNEL: &str = "email";

pub fn parse_mailbox(address: &str) -> Result<Mailbox, AddressError> {
    address.trim().parse()
}

/// Parse a comma-separated recipient list. Empty entries are ignored.
pub fn parse_recipients(list: &str) -> Result<Vec<Mailbox>, AddressError> {
    let recipients = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_mailbox)
        .collect::<Result<Vec<_>, _>>()?;
    if recipients.is_empty() {
        return Err(AddressError::MissingParts);
    }
    Ok(recipients)
}

pub struct EmailChannel {
    transport: SmtpTransport,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailChannel {
    /// Build the SMTP transport. `settings` must already be validated.
    pub fn new(settings: &EmailSettings, timeout: Duration) -> Result<Self, WatchError> {
        let missing =
            |field: &str| WatchError::ConfigValidation(vec![format!("{field} is required")]);

        let username = settings.username.clone().ok_or_else(|| missing("EMAIL_USERNAME"))?;
        let password = settings.password.as_ref().ok_or_else(|| missing("EMAIL_PASSWORD"))?;
        let from = settings.from.as_deref().ok_or_else(|| missing("EMAIL_FROM"))?;
        let to = settings.to.as_deref().ok_or_else(|| missing("EMAIL_TO"))?;

        let invalid = |field: &str, e: AddressError| {
            WatchError::ConfigValidation(vec![format!("{field} is not a valid address: {e}")])
        };
        let from = parse_mailbox(from).map_err(|e| invalid("EMAIL_FROM", e))?;
        let to = parse_recipients(to).map_err(|e| invalid("EMAIL_TO", e))?;

        let transport = SmtpTransport::starttls_relay(&settings.smtp_server)
            .map_err(|e| WatchError::NotificationDelivery {
                channel: CHANNEL,
                message: format!("cannot set up SMTP relay {}: {e}", settings.smtp_server),
            })?
            .port(settings.smtp_port)
            .credentials(Credentials::new(username, password.expose().to_string()))
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }

    pub fn recipient_count(&self) -> usize {
        self.to.len()
    }
}

impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    fn deliver(&self, message: &RenderedMessage) -> Result<(), DeliveryFailure> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        let email = builder
            .body(message.body.clone())
            .map_err(|e| DeliveryFailure::permanent(format!("could not build email: {e}")))?;

        self.transport.send(&email).map(|_| ()).map_err(|e| {
            if e.is_permanent() || e.is_client() {
                let hint = if e.status().map_or(false, |code| code.to_string() == "535") {
                    " (authentication rejected, check EMAIL_USERNAME and EMAIL_PASSWORD)"
                } else {
                    ""
                };
                DeliveryFailure::permanent(format!("SMTP error: {e}{hint}"))
            } else {
                DeliveryFailure::transient(format!("SMTP error: {e}"))
            }
        })
    }
}
