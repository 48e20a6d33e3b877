//! # opswatch-rolesync
//!
//! Mirrors Checkmarx team membership into Elasticsearch role mappings.
//!
//! The run is a straight line: [`TeamSource`] fetches the team tree,
//! [`resolver::resolve`] turns full team paths into role names and rejects
//! collisions, [`RoleMappingWriter`] replaces each mapping's user list, and
//! [`ConflictLogger`] records collisions and per-team failures to a side log.
//! [`pipeline::run`] wires them together.

pub mod checkmarx;
pub mod config;
pub mod conflict_log;
pub mod elastic;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod role_template;
pub mod team;
pub mod writer;

pub use checkmarx::CheckmarxClient;
pub use config::{CheckmarxConfig, ElasticConfig, RoleSyncConfig};
pub use conflict_log::ConflictLogger;
pub use elastic::{ElasticClient, RoleMapping, RoleMappingStore};
pub use error::RoleSyncError;
pub use pipeline::{RoleSyncOptions, RoleSyncReport};
pub use resolver::{Conflict, Resolution, ResolvedRole};
pub use role_template::RoleTemplate;
pub use team::{Team, TeamPath, TeamSource};
pub use writer::{RoleMappingWriter, TeamWriteResult, WriteOutcome};
