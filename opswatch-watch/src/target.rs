//! Built-in watch targets: which page to poll and how to read it.

use std::fmt;
use std::str::FromStr;

use crate::error::WatchError;
use crate::extractor::{Selection, VersionExtractor};

/// A vendor release page opswatch knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchTarget {
    /// Sonatype IQ Server release notes. Releases are three-digit numbers.
    #[default]
    Sonatype,
    /// Elasticsearch download page.
    Elasticsearch,
    /// nginx download page, stable branch.
    Nginx,
}

impl WatchTarget {
    pub fn all() -> &'static [WatchTarget] {
        &[Self::Sonatype, Self::Elasticsearch, Self::Nginx]
    }

    /// Human-readable product name used in notifications.
    pub fn product(self) -> &'static str {
        match self {
            Self::Sonatype => "Sonatype IQ Server",
            Self::Elasticsearch => "Elasticsearch",
            Self::Nginx => "nginx (stable)",
        }
    }

    pub fn page_url(self) -> &'static str {
        match self {
            Self::Sonatype => "https://help.sonatype.com/en/iq-server-release-notes.html",
            Self::Elasticsearch => "https://www.elastic.co/downloads/elasticsearch",
            Self::Nginx => "https://nginx.org/en/download.html",
        }
    }

    pub fn default_version_file(self) -> &'static str {
        match self {
            Self::Sonatype => "sonatype_last_version.txt",
            Self::Elasticsearch => "elasticsearch_last_version.txt",
            Self::Nginx => "nginx_last_version.txt",
        }
    }

    pub fn extractor(self) -> Result<VersionExtractor, WatchError> {
        match self {
            Self::Sonatype => VersionExtractor::new(r"\b\d{3}\b", Selection::Highest),
            Self::Elasticsearch => VersionExtractor::new(
                r"(?i)Version:\s*</strong>\s*([\d.]+)</p>",
                Selection::First,
            ),
            Self::Nginx => Ok(VersionExtractor::new(
                r"nginx-(\d+\.\d+\.\d+)\.tar\.gz",
                Selection::First,
            )?
            .after("Stable version")),
        }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sonatype => "sonatype",
            Self::Elasticsearch => "elasticsearch",
            Self::Nginx => "nginx",
        };
        f.write_str(name)
    }
}

impl FromStr for WatchTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sonatype" | "sonatype-iq" => Ok(Self::Sonatype),
            "elasticsearch" | "elastic" => Ok(Self::Elasticsearch),
            "nginx" => Ok(Self::Nginx),
            other => Err(format!(
                "unknown watch target '{other}'; expected: sonatype, elasticsearch, nginx"
            )),
        }
    }
}
