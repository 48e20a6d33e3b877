//! Elasticsearch security API client: the [`RoleMappingStore`] used in
//! production.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};

use opswatch_core::{HttpFailure, RetryError, RetryPolicy};

use crate::config::ElasticConfig;
use crate::error::RoleSyncError;
use crate::team::TeamPath;

const SERVICE: &str = "Elasticsearch";

/// A stored role mapping, reduced to what the sync compares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleMapping {
    pub enabled: bool,
    pub roles: Vec<String>,
    /// Usernames matched by `field.username` rules anywhere in the rule tree.
    pub usernames: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct RoleMappingDto {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    rules: Value,
}

impl From<RoleMappingDto> for RoleMapping {
    fn from(dto: RoleMappingDto) -> Self {
        let mut usernames = BTreeSet::new();
        collect_usernames(&dto.rules, &mut usernames);
        Self {
            enabled: dto.enabled,
            roles: dto.roles,
            usernames,
        }
    }
}

/// Walk a role-mapping rule tree collecting `{"field": {"username": ...}}`
/// values, whether given as a string or an array.
fn collect_usernames(rules: &Value, out: &mut BTreeSet<String>) {
    match rules {
        Value::Object(map) => {
            if let Some(username) = map.get("field").and_then(|f| f.get("username")) {
                match username {
                    Value::String(s) => {
                        out.insert(s.clone());
                    }
                    Value::Array(items) => {
                        out.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                    }
                    _ => {}
                }
            }
            for value in map.values() {
                collect_usernames(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_usernames(item, out);
            }
        }
        _ => {}
    }
}

/// Body for `PUT _security/role_mapping/<role_name>`.
///
/// The rule list is the complete membership: whatever the mapping held
/// before is replaced.
pub fn role_mapping_body(role_name: &str, members: &BTreeSet<String>, paths: &[TeamPath]) -> Value {
    let rules: Vec<Value> = members
        .iter()
        .map(|username| json!({ "field": { "username": username } }))
        .collect();
    let team_paths: Vec<&str> = paths.iter().map(|p| p.0.as_str()).collect();
    json!({
        "enabled": true,
        "roles": [role_name],
        "rules": { "any": rules },
        "metadata": {
            "source": "checkmarx",
            "team_paths": team_paths,
        },
    })
}

/// Target store for role mappings and roles.
pub trait RoleMappingStore {
    /// `Ok(None)` when no mapping with that name exists.
    fn get_role_mapping(&self, name: &str) -> Result<Option<RoleMapping>, RoleSyncError>;

    /// Create or fully replace the mapping `name`.
    fn put_role_mapping(&self, name: &str, body: &Value) -> Result<(), RoleSyncError>;

    fn role_exists(&self, name: &str) -> Result<bool, RoleSyncError>;

    fn put_role(&self, name: &str, body: &Value) -> Result<(), RoleSyncError>;
}

/// Basic-auth client for the Elasticsearch `_security` API.
pub struct ElasticClient {
    agent: ureq::Agent,
    base_url: String,
    authorization: String,
    retry: RetryPolicy,
}

impl ElasticClient {
    pub fn new(agent: ureq::Agent, config: &ElasticConfig, retry: RetryPolicy) -> Self {
        let credentials = format!("{}:{}", config.username, config.password.expose());
        Self {
            agent,
            base_url: config.url.trim_end_matches('/').to_string(),
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
            retry,
        }
    }

    fn url(&self, kind: &str, name: &str) -> String {
        format!("{}/_security/{kind}/{}", self.base_url, encode_segment(name))
    }

    /// GET that treats 404 as `Ok(None)`.
    fn get_optional(
        &self,
        label: &str,
        url: &str,
    ) -> Result<Option<ureq::Response>, RoleSyncError> {
        let result = self.retry.run(label, |_| {
            self.agent
                .get(url)
                .set("Authorization", &self.authorization)
                .call()
                .map_err(HttpFailure::from)
        });
        found_or_missing(result)
    }

    fn put(&self, label: &str, url: &str, body: &Value) -> Result<(), RoleSyncError> {
        self.retry
            .run(label, |_| {
                self.agent
                    .put(url)
                    .set("Authorization", &self.authorization)
                    .send_json(body.clone())
                    .map_err(HttpFailure::from)
            })
            .map(|_| ())
            .map_err(|e| RoleSyncError::from_retry(SERVICE, e))
    }
}

impl RoleMappingStore for ElasticClient {
    fn get_role_mapping(&self, name: &str) -> Result<Option<RoleMapping>, RoleSyncError> {
        let url = self.url("role_mapping", name);
        let Some(response) = self.get_optional("get role mapping", &url)? else {
            return Ok(None);
        };
        let mut body: serde_json::Map<String, Value> = response
            .into_json()
            .map_err(|e| RoleSyncError::decode(SERVICE, &url, e))?;
        let Some(entry) = body.remove(name) else {
            return Ok(None);
        };
        let dto: RoleMappingDto =
            serde_json::from_value(entry).map_err(|e| RoleSyncError::decode(SERVICE, &url, e))?;
        Ok(Some(dto.into()))
    }

    fn put_role_mapping(&self, name: &str, body: &Value) -> Result<(), RoleSyncError> {
        self.put("put role mapping", &self.url("role_mapping", name), body)
    }

    fn role_exists(&self, name: &str) -> Result<bool, RoleSyncError> {
        let url = self.url("role", name);
        Ok(self.get_optional("get role", &url)?.is_some())
    }

    fn put_role(&self, name: &str, body: &Value) -> Result<(), RoleSyncError> {
        self.put("put role", &self.url("role", name), body)
    }
}

/// A 404 means the resource does not exist; every other failure is an error.
fn found_or_missing<T>(
    result: Result<T, RetryError<HttpFailure>>,
) -> Result<Option<T>, RoleSyncError> {
    match result {
        Ok(found) => Ok(Some(found)),
        Err(RetryError::Permanent { source, .. }) if source.status() == Some(404) => Ok(None),
        Err(err) => Err(RoleSyncError::from_retry(SERVICE, err)),
    }
}

/// Percent-encode a role name for use as a single URL path segment.
fn encode_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_body_lists_every_member_once() {
        let members = BTreeSet::from(["bob".to_string(), "alice".to_string()]);
        let body = role_mapping_body("DIT", &members, &[TeamPath::from("/CxServer/DIT")]);
        assert_eq!(body["roles"], json!(["DIT"]));
        assert_eq!(
            body["rules"]["any"],
            json!([
                {"field": {"username": "alice"}},
                {"field": {"username": "bob"}}
            ])
        );
        assert_eq!(body["metadata"]["team_paths"], json!(["/CxServer/DIT"]));
    }

    #[test]
    fn usernames_are_collected_from_nested_rules() {
        let dto: RoleMappingDto = serde_json::from_value(json!({
            "enabled": true,
            "roles": ["DIT"],
            "rules": {
                "any": [
                    {"field": {"username": "alice"}},
                    {"all": [
                        {"field": {"username": ["bob", "carol"]}},
                        {"field": {"realm.name": "ldap1"}}
                    ]}
                ]
            }
        }))
        .unwrap();
        let mapping = RoleMapping::from(dto);
        assert_eq!(
            mapping.usernames,
            BTreeSet::from(["alice".into(), "bob".into(), "carol".into()])
        );
        assert!(mapping.enabled);
    }

    #[test]
    fn role_names_are_path_encoded() {
        assert_eq!(encode_segment("Team A/B"), "Team%20A%2FB");
        assert_eq!(encode_segment("DIT_ops-1"), "DIT_ops-1");
    }

    fn failed(status: u16) -> Result<(), RetryError<HttpFailure>> {
        Err(RetryError::Permanent {
            attempt: 1,
            source: HttpFailure::Status {
                status,
                url: "https://es.test/_security/role/DIT".to_string(),
                body: String::new(),
            },
        })
    }

    #[test]
    fn not_found_means_missing() {
        assert!(matches!(found_or_missing(failed(404)), Ok(None)));
        assert!(matches!(found_or_missing(Ok::<_, RetryError<HttpFailure>>(1)), Ok(Some(1))));
    }

    #[test]
    fn other_failures_are_not_treated_as_missing() {
        assert!(matches!(
            found_or_missing(failed(403)),
            Err(RoleSyncError::Auth { .. })
        ));
        assert!(matches!(
            found_or_missing(failed(500)),
            Err(RoleSyncError::Api { status: 500, .. })
        ));
    }
}
