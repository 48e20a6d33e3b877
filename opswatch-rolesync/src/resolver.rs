//! Short-name resolution and collision detection.
//!
//! Every team maps to the role named after its last path segment. When two
//! or more distinct full paths share that segment the name is a conflict:
//! none of the contributing teams may be written, since any choice would
//! silently grant one team's role to another team's members.

use std::collections::{BTreeSet, HashMap};

use crate::team::{Team, TeamPath};

/// A role name produced by exactly one team path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub short_name: String,
    pub path: TeamPath,
    pub members: BTreeSet<String>,
}

/// A role name claimed by more than one team path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub short_name: String,
    /// Contributing full paths in discovery order.
    pub paths: Vec<TeamPath>,
}

/// Outcome of resolving one short name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedRole),
    Conflicted(Conflict),
}

impl Resolution {
    pub fn short_name(&self) -> &str {
        match self {
            Self::Resolved(r) => &r.short_name,
            Self::Conflicted(c) => &c.short_name,
        }
    }
}

struct Group {
    short_name: String,
    paths: Vec<TeamPath>,
    members: BTreeSet<String>,
}

/// Group `teams` by short name.
///
/// With `only` set, teams whose short name is not listed are dropped before
/// grouping. Output order follows the first appearance of each short name
/// in `teams`. A full path reported twice counts once; its member sets are
/// merged.
pub fn resolve(teams: &[Team], only: Option<&[String]>) -> Vec<Resolution> {
    let wanted: Option<BTreeSet<&str>> =
        only.map(|names| names.iter().map(String::as_str).collect());

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for team in teams {
        let short = team.short_name();
        if let Some(wanted) = &wanted {
            if !wanted.contains(short) {
                continue;
            }
        }
        let slot = *index.entry(short).or_insert_with(|| {
            groups.push(Group {
                short_name: short.to_string(),
                paths: Vec::new(),
                members: BTreeSet::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        if !group.paths.contains(&team.path) {
            group.paths.push(team.path.clone());
        }
        group.members.extend(team.members.iter().cloned());
    }

    groups
        .into_iter()
        .map(|group| {
            if group.paths.len() > 1 {
                Resolution::Conflicted(Conflict {
                    short_name: group.short_name,
                    paths: group.paths,
                })
            } else {
                let path = group
                    .paths
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| TeamPath(group.short_name.clone()));
                Resolution::Resolved(ResolvedRole {
                    short_name: group.short_name,
                    path,
                    members: group.members,
                })
            }
        })
        .collect()
}

/// Names in `only` that matched no fetched team.
pub fn unmatched_filters<'a>(teams: &[Team], only: &'a [String]) -> Vec<&'a str> {
    let known: BTreeSet<&str> = teams.iter().map(Team::short_name).collect();
    only.iter()
        .map(String::as_str)
        .filter(|name| !known.contains(name))
        .collect()
}
