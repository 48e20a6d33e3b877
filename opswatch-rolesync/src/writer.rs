//! Role-mapping writer.
//!
//! ## Per-team protocol
//!
//! 1. Skip teams with no accessible members.
//! 2. Look up the existing mapping.
//! 3. Present → replace its user list with exactly the team's members.
//! 4. Absent, `create_roles` off → record a failure.
//! 5. Absent, `create_roles` on → create the role from [`RoleTemplate`] if
//!    it does not exist, then create the mapping.
//!
//! In dry-run mode steps 2 and the role lookup still run; nothing is written.
//! A failure for one team is returned as [`WriteOutcome::Failed`] and never
//! aborts the others.

use crate::elastic::{role_mapping_body, RoleMappingStore};
use crate::error::RoleSyncError;
use crate::resolver::ResolvedRole;
use crate::role_template::RoleTemplate;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of writing one role mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Existing mapping replaced.
    Updated {
        added: Vec<String>,
        removed: Vec<String>,
    },
    /// Mapping created; `role_created` when the role was created too.
    Created { role_created: bool },
    /// `--dry-run`: the existing mapping *would* have been replaced.
    WouldUpdate {
        added: Vec<String>,
        removed: Vec<String>,
    },
    /// `--dry-run`: the mapping *would* have been created.
    WouldCreate { role_created: bool },
    /// Nothing to write for this team.
    Skipped { reason: String },
    Failed { error: String },
}

impl WriteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-team summary returned by [`RoleMappingWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamWriteResult {
    pub short_name: String,
    pub member_count: usize,
    /// Sorted usernames the mapping was (or would be) set to.
    pub members: Vec<String>,
    pub outcome: WriteOutcome,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub struct RoleMappingWriter<'a> {
    store: &'a dyn RoleMappingStore,
    template: &'a RoleTemplate,
    create_roles: bool,
    dry_run: bool,
}

impl<'a> RoleMappingWriter<'a> {
    pub fn new(
        store: &'a dyn RoleMappingStore,
        template: &'a RoleTemplate,
        create_roles: bool,
        dry_run: bool,
    ) -> Self {
        Self {
            store,
            template,
            create_roles,
            dry_run,
        }
    }

    /// Write one resolved role. Never returns early on store errors; they
    /// become [`WriteOutcome::Failed`].
    pub fn write(&self, role: &ResolvedRole) -> TeamWriteResult {
        let outcome = if role.members.is_empty() {
            tracing::warn!(team = %role.path, "team has no accessible users, skipping");
            WriteOutcome::Skipped {
                reason: "no accessible users".to_string(),
            }
        } else {
            match self.try_write(role) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(
                        role = %role.short_name,
                        error = %err,
                        "role mapping write failed"
                    );
                    WriteOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            }
        };

        TeamWriteResult {
            short_name: role.short_name.clone(),
            member_count: role.members.len(),
            members: role.members.iter().cloned().collect(),
            outcome,
        }
    }

    fn try_write(&self, role: &ResolvedRole) -> Result<WriteOutcome, RoleSyncError> {
        let name = role.short_name.as_str();
        let body = role_mapping_body(name, &role.members, std::slice::from_ref(&role.path));

        match self.store.get_role_mapping(name)? {
            Some(existing) => {
                let added: Vec<String> = role
                    .members
                    .difference(&existing.usernames)
                    .cloned()
                    .collect();
                let removed: Vec<String> = existing
                    .usernames
                    .difference(&role.members)
                    .cloned()
                    .collect();
                if self.dry_run {
                    tracing::info!(
                        role = name,
                        users = role.members.len(),
                        added = added.len(),
                        removed = removed.len(),
                        "[dry-run] would replace role mapping"
                    );
                    return Ok(WriteOutcome::WouldUpdate { added, removed });
                }
                self.store.put_role_mapping(name, &body)?;
                tracing::info!(
                    role = name,
                    users = role.members.len(),
                    added = added.len(),
                    removed = removed.len(),
                    "replaced role mapping"
                );
                Ok(WriteOutcome::Updated { added, removed })
            }
            None if !self.create_roles => {
                let error = format!(
                    "role mapping '{name}' does not exist; rerun with --create-roles to create it"
                );
                tracing::error!(role = name, "{error}");
                Ok(WriteOutcome::Failed { error })
            }
            None => {
                let role_created = !self.store.role_exists(name)?;
                if self.dry_run {
                    tracing::info!(
                        role = name,
                        users = role.members.len(),
                        create_role = role_created,
                        "[dry-run] would create role mapping"
                    );
                    return Ok(WriteOutcome::WouldCreate { role_created });
                }
                if role_created {
                    self.store.put_role(name, &self.template.render(name))?;
                    tracing::info!(role = name, "created role");
                }
                self.store.put_role_mapping(name, &body)?;
                tracing::info!(role = name, users = role.members.len(), "created role mapping");
                Ok(WriteOutcome::Created { role_created })
            }
        }
    }
}
