//! Rendering of the notification text from built-in `tera` templates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::WatchError;

const SUBJECT: &str = "email_subject.txt";
const BODY: &str = "email_body.txt";
const SLACK: &str = "slack.txt";

const TEMPLATES: [(&str, &str); 3] = [
    (SUBJECT, include_str!("../templates/email_subject.tera")),
    (BODY, include_str!("../templates/email_body.tera")),
    (SLACK, include_str!("../templates/slack.tera")),
];

/// The facts every channel announces.
#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub product: String,
    pub version: String,
    pub previous: Option<String>,
    pub page_url: String,
    #[serde(serialize_with = "timestamp")]
    pub detected_at: DateTime<Utc>,
}

fn timestamp<S: serde::Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Channel-ready text for one announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    pub slack_text: String,
}

pub struct MessageRenderer {
    tera: Tera,
}

impl MessageRenderer {
    pub fn new() -> Result<Self, WatchError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    pub fn render(&self, announcement: &Announcement) -> Result<RenderedMessage, WatchError> {
        let ctx = Context::from_serialize(announcement)?;
        Ok(RenderedMessage {
            subject: self.tera.render(SUBJECT, &ctx)?.trim().to_string(),
            body: self.tera.render(BODY, &ctx)?,
            slack_text: self.tera.render(SLACK, &ctx)?.trim_end().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn announcement(previous: Option<&str>) -> Announcement {
        Announcement {
            product: "Sonatype IQ Server".into(),
            version: "1.190.0".into(),
            previous: previous.map(String::from),
            page_url: "https://help.sonatype.com/en/iq-server-release-notes.html".into(),
            detected_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn subject_names_product_and_version() {
        let msg = MessageRenderer::new().unwrap().render(&announcement(None)).unwrap();
        assert_eq!(msg.subject, "New Sonatype IQ Server version detected: 1.190.0");
    }

    #[test]
    fn body_and_slack_mention_previous_version_when_known() {
        let msg = MessageRenderer::new()
            .unwrap()
            .render(&announcement(Some("1.189.0")))
            .unwrap();
        assert!(msg.body.contains("Previous version: 1.189.0"));
        assert!(msg.body.contains("2026-03-01 09:30:00 UTC"));
        assert!(msg.slack_text.contains("(was `1.189.0`)"));
        assert!(msg.slack_text.contains("|View release notes>"));
    }

    #[test]
    fn previous_line_is_omitted_when_unknown() {
        let msg = MessageRenderer::new().unwrap().render(&announcement(None)).unwrap();
        assert!(!msg.body.contains("Previous version"));
        assert!(!msg.slack_text.contains("was"));
    }

    #[test]
    fn templates_are_not_html_escaped() {
        let mut a = announcement(None);
        a.page_url = "https://example.com/notes?a=1&b=2".into();
        let msg = MessageRenderer::new().unwrap().render(&a).unwrap();
        assert!(msg.body.contains("a=1&b=2"));
    }
}
