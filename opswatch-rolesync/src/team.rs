//! Team domain types and the [`TeamSource`] seam.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RoleSyncError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Full hierarchical team path as reported by Checkmarx, e.g. `/CxServer/DIT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamPath(pub String);

impl TeamPath {
    /// Last path segment: `/CxServer/SP/DIT` → `DIT`.
    ///
    /// Trailing separators are ignored; a path without separators is its own
    /// short name.
    pub fn short_name(&self) -> &str {
        let trimmed = self.0.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

impl fmt::Display for TeamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TeamPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TeamPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// A team as fetched for one run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub path: TeamPath,
    /// Unique usernames of the members the fetching account could see.
    pub members: BTreeSet<String>,
}

impl Team {
    pub fn new<I, S>(path: impl Into<TeamPath>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn short_name(&self) -> &str {
        self.path.short_name()
    }
}

/// Read-only provider of the complete team tree.
pub trait TeamSource {
    /// Every team with its full path and members, in discovery order.
    fn fetch_teams(&self) -> Result<Vec<Team>, RoleSyncError>;
}
