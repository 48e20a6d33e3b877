//! Checkmarx SAST client: the [`TeamSource`] used in production.
//!
//! Authenticates with the OAuth2 resource-owner password grant and reads
//! `/cxrestapi/auth/teams` plus each team's `/users`. Read-only.

use std::collections::BTreeSet;

use serde::Deserialize;

use opswatch_core::{HttpFailure, RetryError, RetryPolicy, Secret};

use crate::config::CheckmarxConfig;
use crate::error::RoleSyncError;
use crate::team::{Team, TeamPath, TeamSource};

const SERVICE: &str = "Checkmarx";
const TOKEN_PATH: &str = "/cxrestapi/auth/identity/connect/token";
const TEAMS_PATH: &str = "/cxrestapi/auth/teams";
const SCOPE: &str = "sast_rest_api";
const CLIENT_ID: &str = "resource_owner_client";
/// Public client secret shipped with every Checkmarx SAST installation.
const CLIENT_SECRET: &str = "014DF517-39D1-4453-B7B3-9930C563627C";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamDto {
    id: i64,
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    #[serde(rename = "userName", alias = "username", default)]
    user_name: Option<String>,
}

/// Authenticated Checkmarx session.
pub struct CheckmarxClient {
    agent: ureq::Agent,
    base_url: String,
    token: Secret,
    retry: RetryPolicy,
}

impl CheckmarxClient {
    /// Obtain a bearer token for `config.username`.
    ///
    /// Rejected credentials, scope, or permissions yield
    /// [`RoleSyncError::Auth`]; the password never appears in the error.
    pub fn authenticate(
        agent: ureq::Agent,
        config: &CheckmarxConfig,
        retry: RetryPolicy,
    ) -> Result<Self, RoleSyncError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let url = format!("{base_url}{TOKEN_PATH}");
        let response = retry
            .run("checkmarx token", |_| {
                agent
                    .post(&url)
                    .send_form(&[
                        ("username", config.username.as_str()),
                        ("password", config.password.expose()),
                        ("grant_type", "password"),
                        ("scope", SCOPE),
                        ("client_id", CLIENT_ID),
                        ("client_secret", CLIENT_SECRET),
                    ])
                    .map_err(HttpFailure::from)
            })
            .map_err(|err| token_error(err, &config.username))?;
        let token: TokenResponse = response
            .into_json()
            .map_err(|e| RoleSyncError::decode(SERVICE, &url, e))?;

        tracing::info!(url = %base_url, "authenticated to Checkmarx");
        Ok(Self {
            agent,
            base_url,
            token: Secret::new(token.access_token),
            retry,
        })
    }

    fn get(&self, label: &str, url: &str) -> Result<ureq::Response, RetryError<HttpFailure>> {
        let bearer = format!("Bearer {}", self.token.expose());
        self.retry.run(label, |_| {
            self.agent
                .get(url)
                .set("Authorization", &bearer)
                .set("Accept", "application/json")
                .call()
                .map_err(HttpFailure::from)
        })
    }

    fn list_teams(&self) -> Result<Vec<TeamDto>, RoleSyncError> {
        let url = format!("{}{TEAMS_PATH}", self.base_url);
        let response = self
            .get("checkmarx teams", &url)
            .map_err(|e| RoleSyncError::from_retry(SERVICE, e))?;
        let teams: Vec<TeamDto> = response
            .into_json()
            .map_err(|e| RoleSyncError::decode(SERVICE, &url, e))?;
        tracing::info!(count = teams.len(), "retrieved teams from Checkmarx");
        Ok(teams)
    }

    /// Members of one team. Failures are logged and yield an empty set so a
    /// single unreadable team does not abort the run.
    fn team_members(&self, team: &TeamDto) -> BTreeSet<String> {
        let url = format!("{}{TEAMS_PATH}/{}/users", self.base_url, team.id);
        let response = match self.get("checkmarx team users", &url) {
            Ok(response) => response,
            Err(err) => {
                log_member_failure(team, &err);
                return BTreeSet::new();
            }
        };
        match response.into_json::<Vec<UserDto>>() {
            Ok(users) => users
                .into_iter()
                .filter_map(|u| u.user_name)
                .filter(|name| !name.is_empty())
                .collect(),
            Err(err) => {
                let err = RoleSyncError::decode(SERVICE, &url, err);
                tracing::error!(
                    team = %team.full_name,
                    id = team.id,
                    error = %err,
                    "failed to read team members"
                );
                BTreeSet::new()
            }
        }
    }
}

/// A rejected token request is an authentication failure whatever the
/// 4xx flavour Checkmarx picks; anything else keeps its usual mapping.
fn token_error(err: RetryError<HttpFailure>, username: &str) -> RoleSyncError {
    match err.inner().status() {
        Some(status) if (400..=403).contains(&status) => RoleSyncError::Auth {
            service: SERVICE,
            reason: format!("token request rejected for user '{username}' (HTTP {status})"),
        },
        _ => RoleSyncError::from_retry(SERVICE, err),
    }
}

/// Why a team's `/users` call produced no members.
#[derive(Debug, PartialEq, Eq)]
enum MemberFailure {
    /// 403: this account may not read the team.
    Forbidden,
    /// 401: the bearer token is no longer accepted.
    SessionRejected,
    Other,
}

impl MemberFailure {
    fn classify(err: &RetryError<HttpFailure>) -> Self {
        match err.inner().status() {
            Some(403) => Self::Forbidden,
            Some(401) => Self::SessionRejected,
            _ => Self::Other,
        }
    }
}

fn log_member_failure(team: &TeamDto, err: &RetryError<HttpFailure>) {
    match MemberFailure::classify(err) {
        MemberFailure::Forbidden => tracing::warn!(
            team = %team.full_name,
            id = team.id,
            "access denied to team members, skipping"
        ),
        MemberFailure::SessionRejected => tracing::error!(
            team = %team.full_name,
            id = team.id,
            "session rejected (HTTP 401) reading team members; token may have expired"
        ),
        MemberFailure::Other => tracing::error!(
            team = %team.full_name,
            id = team.id,
            error = %err.inner(),
            "failed to read team members"
        ),
    }
}

impl TeamSource for CheckmarxClient {
    fn fetch_teams(&self) -> Result<Vec<Team>, RoleSyncError> {
        let dtos = self.list_teams()?;
        let mut teams = Vec::with_capacity(dtos.len());
        for dto in &dtos {
            let members = self.team_members(dto);
            tracing::info!(team = %dto.full_name, users = members.len(), "fetched team");
            teams.push(Team {
                path: TeamPath(dto.full_name.clone()),
                members,
            });
        }
        Ok(teams)
    }
}
