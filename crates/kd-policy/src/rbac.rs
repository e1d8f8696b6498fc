// rbac.rs — Permission buckets for service accounts.
//
// Given one cluster's roles and bindings, work out the highest
// `PermissionLevel` each service account reaches. Lookup is two-level:
//
// 1. cluster-wide evaluator (cluster role bindings) → CLUSTER_ADMIN or
//    ELEVATED_CLUSTER_WIDE
// 2. one evaluator per namespace (namespaced bindings) → the running
//    maximum of ELEVATED_IN_NAMESPACE / DEFAULT across namespaces
//
// A subject with nothing applicable is NONE.

use std::collections::{BTreeMap, HashMap};

use kd_model::{
    K8sRole, K8sRoleBinding, PermissionLevel, PolicyRule, ServiceAccount, SubjectKind,
};

const READ_VERBS: &[&str] = &["get", "list", "watch"];
const WRITE_VERBS: &[&str] = &["create", "update", "patch", "delete", "deletecollection"];

/// Groups every service account belongs to, besides its own.
const ALL_SERVICE_ACCOUNTS: &str = "system:serviceaccounts";
const AUTHENTICATED: &str = "system:authenticated";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SubjectKey {
    ServiceAccount { namespace: String, name: String },
    Group(String),
}

/// Rules reachable per subject through one set of bindings.
#[derive(Debug, Default)]
pub struct Evaluator {
    rules: HashMap<SubjectKey, Vec<PolicyRule>>,
}

impl Evaluator {
    /// Index `bindings` against the roles they reference. Bindings to
    /// unknown roles grant nothing; user subjects are ignored.
    pub fn new<'a>(
        roles: &HashMap<&str, &'a K8sRole>,
        bindings: impl IntoIterator<Item = &'a K8sRoleBinding>,
    ) -> Self {
        let mut rules: HashMap<SubjectKey, Vec<PolicyRule>> = HashMap::new();
        for binding in bindings {
            let Some(role) = roles.get(binding.role_id.as_str()) else {
                tracing::debug!(
                    binding = %binding.name,
                    role_id = %binding.role_id,
                    "binding references an unknown role"
                );
                continue;
            };
            for subject in &binding.subjects {
                let key = match subject.kind {
                    SubjectKind::ServiceAccount => SubjectKey::ServiceAccount {
                        namespace: if subject.namespace.is_empty() {
                            binding.namespace.clone()
                        } else {
                            subject.namespace.clone()
                        },
                        name: subject.name.clone(),
                    },
                    SubjectKind::Group => SubjectKey::Group(subject.name.clone()),
                    SubjectKind::User => continue,
                };
                rules
                    .entry(key)
                    .or_default()
                    .extend(role.rules.iter().cloned());
            }
        }
        Self { rules }
    }

    /// Every rule that applies to `sa`, directly or through a group.
    pub fn rules_for(&self, sa: &ServiceAccount) -> Vec<&PolicyRule> {
        let keys = [
            SubjectKey::ServiceAccount {
                namespace: sa.namespace.clone(),
                name: sa.name.clone(),
            },
            SubjectKey::Group(ALL_SERVICE_ACCOUNTS.to_string()),
            SubjectKey::Group(format!("{}:{}", ALL_SERVICE_ACCOUNTS, sa.namespace)),
            SubjectKey::Group(AUTHENTICATED.to_string()),
        ];
        keys.iter()
            .filter_map(|k| self.rules.get(k))
            .flatten()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The two-level lookup for one cluster.
#[derive(Debug)]
pub struct ClusterPermissions {
    cluster_wide: Evaluator,
    namespaces: BTreeMap<String, Evaluator>,
}

impl ClusterPermissions {
    pub fn new(roles: &[K8sRole], bindings: &[K8sRoleBinding]) -> Self {
        let by_id: HashMap<&str, &K8sRole> = roles.iter().map(|r| (r.id.as_str(), r)).collect();

        let cluster_wide = Evaluator::new(&by_id, bindings.iter().filter(|b| b.cluster_role));

        let mut namespaced: BTreeMap<String, Vec<&K8sRoleBinding>> = BTreeMap::new();
        for role in roles.iter().filter(|r| !r.cluster_role && !r.namespace.is_empty()) {
            namespaced.entry(role.namespace.clone()).or_default();
        }
        for binding in bindings.iter().filter(|b| !b.cluster_role) {
            namespaced
                .entry(binding.namespace.clone())
                .or_default()
                .push(binding);
        }
        let namespaces = namespaced
            .into_iter()
            .map(|(ns, bindings)| (ns, Evaluator::new(&by_id, bindings)))
            .collect();

        Self {
            cluster_wide,
            namespaces,
        }
    }

    /// Highest level `sa` reaches in this cluster.
    pub fn level_for(&self, sa: &ServiceAccount) -> PermissionLevel {
        let cluster_rules = self.cluster_wide.rules_for(sa);
        if cluster_rules
            .iter()
            .any(|r| r.allows_verb("*") && r.covers_all_resources())
        {
            return PermissionLevel::ClusterAdmin;
        }
        if cluster_rules.iter().any(|r| reads(r) || writes(r)) {
            return PermissionLevel::ElevatedClusterWide;
        }

        let mut level = PermissionLevel::None;
        for evaluator in self.namespaces.values() {
            for rule in evaluator.rules_for(sa) {
                if writes(rule) || (rule.allows_verb("list") && rule.covers_all_resources()) {
                    // Nothing namespaced goes higher.
                    return PermissionLevel::ElevatedInNamespace;
                }
                if reads(rule) {
                    level = level.max(PermissionLevel::Default);
                }
            }
        }
        level
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }
}

fn reads(rule: &PolicyRule) -> bool {
    rule.has_resources() && READ_VERBS.iter().any(|v| rule.allows_verb(v))
}

fn writes(rule: &PolicyRule) -> bool {
    rule.has_resources() && WRITE_VERBS.iter().any(|v| rule.allows_verb(v))
}
