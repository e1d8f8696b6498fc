// rbac.rs — Kubernetes RBAC objects as pulled per cluster.
//
// Roles and bindings come in two scopes. `cluster_role = true` marks a
// ClusterRole / ClusterRoleBinding whose grants apply in every namespace of
// the cluster. A namespaced binding may still point at a ClusterRole; its
// rules then apply only inside the binding's namespace.

use serde::{Deserialize, Serialize};

/// A secured cluster known to the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cluster {
    pub id: String,
    pub name: String,
}

/// A Role or ClusterRole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct K8sRole {
    pub id: String,
    pub name: String,
    /// Empty for cluster roles.
    #[serde(default)]
    pub namespace: String,
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_role: bool,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// One rule of a role: `verbs` allowed on `resources` in `api_groups`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyRule {
    #[serde(default)]
    pub verbs: Vec<String>,
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub non_resource_urls: Vec<String>,
}

impl PolicyRule {
    /// Whether the rule names `verb` explicitly or via `*`.
    pub fn allows_verb(&self, verb: &str) -> bool {
        self.verbs.iter().any(|v| v == "*" || v == verb)
    }

    /// Whether the rule covers every resource.
    pub fn covers_all_resources(&self) -> bool {
        self.resources.iter().any(|r| r == "*")
    }

    /// Rules that only name non-resource URLs (e.g. `/healthz`) grant no
    /// access to API objects.
    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty()
    }
}

/// A RoleBinding or ClusterRoleBinding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct K8sRoleBinding {
    pub id: String,
    pub name: String,
    /// Empty for cluster role bindings.
    #[serde(default)]
    pub namespace: String,
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_role: bool,
    /// Id of the bound role (may be a cluster role for namespaced bindings).
    pub role_id: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    /// Service account namespace. Defaults to the binding's namespace when
    /// empty.
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    ServiceAccount,
    User,
    Group,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ServiceAccount {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub cluster_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_verb_allows_everything() {
        let rule = PolicyRule {
            verbs: vec!["*".to_string()],
            resources: vec!["pods".to_string()],
            ..Default::default()
        };
        assert!(rule.allows_verb("delete"));
        assert!(rule.has_resources());
        assert!(!rule.covers_all_resources());
    }

    #[test]
    fn non_resource_rule_has_no_resources() {
        let rule = PolicyRule {
            verbs: vec!["get".to_string()],
            non_resource_urls: vec!["/healthz".to_string()],
            ..Default::default()
        };
        assert!(rule.allows_verb("get"));
        assert!(!rule.allows_verb("list"));
        assert!(!rule.has_resources());
    }
}
