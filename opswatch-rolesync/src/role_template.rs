//! Fixed permission template for roles created with `--create-roles`.

use serde_json::{json, Value};

/// Shape of an auto-created role. Every field except the role name is the
/// same for every team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTemplate {
    pub cluster: Vec<String>,
    pub index_patterns: Vec<String>,
    pub index_privileges: Vec<String>,
    /// Document field matched against the role name by the DLS query.
    pub dls_field: String,
    pub kibana_application: String,
    pub kibana_privileges: Vec<String>,
}

impl Default for RoleTemplate {
    fn default() -> Self {
        Self {
            cluster: vec!["monitor".to_string()],
            index_patterns: vec!["checkmarx-*".to_string()],
            index_privileges: vec!["read".to_string(), "view_index_metadata".to_string()],
            dls_field: "team".to_string(),
            kibana_application: "kibana-.kibana".to_string(),
            kibana_privileges: vec![
                "feature_dashboard.read".to_string(),
                "feature_discover.read".to_string(),
            ],
        }
    }
}

impl RoleTemplate {
    /// Body for `PUT _security/role/<role_name>`.
    pub fn render(&self, role_name: &str) -> Value {
        let dls_query = json!({ "term": { self.dls_field.as_str(): role_name } }).to_string();
        json!({
            "cluster": self.cluster,
            "indices": [{
                "names": self.index_patterns,
                "privileges": self.index_privileges,
                "query": dls_query,
            }],
            "applications": [{
                "application": self.kibana_application,
                "privileges": self.kibana_privileges,
                "resources": ["*"],
            }],
            "metadata": {
                "team": role_name,
                "managed_by": "opswatch",
            },
        })
    }
}
