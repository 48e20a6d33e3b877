//! Version extraction from raw page content.

use regex::Regex;

use crate::error::WatchError;

/// Which match counts as "the" version when the pattern matches repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Numerically greatest match, comparing dot-separated components.
    Highest,
    /// First match in document order.
    First,
}

/// A pattern plus selection rule.
///
/// When the pattern has a capture group, group 1 is the version; otherwise
/// the whole match is.
#[derive(Debug, Clone)]
pub struct VersionExtractor {
    pattern: Regex,
    anchor: Option<String>,
    selection: Selection,
}

impl VersionExtractor {
    pub fn new(pattern: &str, selection: Selection) -> Result<Self, WatchError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            anchor: None,
            selection,
        })
    }

    /// Only search the part of the page after the first occurrence of
    /// `anchor`.
    pub fn after(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Extract the version from `page`, fetched from `url`.
    pub fn extract(&self, url: &str, page: &str) -> Result<String, WatchError> {
        let not_found = |reason: String| WatchError::NoVersionFound {
            url: url.to_string(),
            reason,
        };

        let haystack = match &self.anchor {
            Some(anchor) => match page.find(anchor.as_str()) {
                Some(pos) => &page[pos + anchor.len()..],
                None => return Err(not_found(format!("marker '{anchor}' not present"))),
            },
            None => page,
        };

        let mut candidates = self.pattern.captures_iter(haystack).filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str())
        });
        let raw = match self.selection {
            Selection::First => candidates.next(),
            Selection::Highest => candidates.max_by_key(|v| version_key(v)),
        }
        .ok_or_else(|| not_found(format!("pattern {} did not match", self.pattern.as_str())))?;

        let clean = sanitize(raw);
        if clean.is_empty() {
            return Err(not_found(format!("match '{raw}' holds no digits")));
        }
        if clean != raw {
            tracing::warn!(raw, sanitized = %clean, "version string sanitized");
        }
        tracing::info!(version = %clean, "found latest version");
        Ok(clean)
    }
}

/// Keep only digits and dots, without leading or trailing dots.
pub fn sanitize(version: &str) -> String {
    let kept: String = version
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    kept.trim_matches('.').to_string()
}

/// Sort key for dotted numeric versions: `1.10.0` > `1.9.3`.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}
