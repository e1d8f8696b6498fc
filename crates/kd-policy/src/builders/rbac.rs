// builders/rbac.rs — Deployments whose service account is over-privileged.
//
// Unlike the other builders this one reads external state: at build time
// it pulls a snapshot of clusters, roles, bindings and service accounts
// from the stores, computes every service account's permission bucket (see
// crate::rbac), and emits an exact-match predicate on
// (cluster, namespace, service account) for each one above the threshold.
// With nobody above the threshold the predicate never matches. The result
// reflects that snapshot only; nothing is cached.

use std::fmt;
use std::sync::Arc;

use kd_model::{ClusterStore, PermissionLevel, RoleBindingStore, RoleStore, ServiceAccountStore};

use super::Built;
use crate::error::PolicyError;
use crate::printer::Printer;
use crate::query::{FieldQuery, Operation, Query};
use crate::rbac::ClusterPermissions;
use crate::registry::{FieldLabel, FieldMetadata, FieldRegistry};
use crate::spec::PolicyFields;

pub const NAME: &str = "rbac permission level";

/// The stores an RBAC snapshot is pulled from.
#[derive(Clone)]
pub struct RbacSources {
    pub clusters: Arc<dyn ClusterStore>,
    pub roles: Arc<dyn RoleStore>,
    pub bindings: Arc<dyn RoleBindingStore>,
    pub service_accounts: Arc<dyn ServiceAccountStore>,
}

impl RbacSources {
    /// Use one backend for all four stores.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ClusterStore + RoleStore + RoleBindingStore + ServiceAccountStore + 'static,
    {
        Self {
            clusters: store.clone(),
            roles: store.clone(),
            bindings: store.clone(),
            service_accounts: store,
        }
    }
}

impl fmt::Debug for RbacSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RbacSources").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct RbacBuilder {
    pub sources: RbacSources,
}

impl RbacBuilder {
    pub fn new(sources: RbacSources) -> Self {
        Self { sources }
    }

    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(policy) = fields.permission_policy else {
            return Ok(None);
        };
        let threshold = policy.permission_level;
        let cluster_field = registry.require(NAME, FieldLabel::ClusterId)?;
        let namespace_field = registry.require(NAME, FieldLabel::Namespace)?;
        let sa_field = registry.require(NAME, FieldLabel::ServiceAccount)?;

        let mut per_cluster = Vec::new();
        for cluster in self.sources.clusters.list_clusters()? {
            let roles = self.sources.roles.list_roles(&cluster.id)?;
            let bindings = self.sources.bindings.list_bindings(&cluster.id)?;
            let accounts = self.sources.service_accounts.list_service_accounts(&cluster.id)?;
            let permissions = ClusterPermissions::new(&roles, &bindings);

            let mut subjects = Vec::new();
            for sa in &accounts {
                let level = permissions.level_for(sa);
                tracing::debug!(
                    cluster = %cluster.id,
                    namespace = %sa.namespace,
                    service_account = %sa.name,
                    level = %level,
                    "computed permission level"
                );
                if level > threshold {
                    subjects.push(Some(Query::Conjunction(vec![
                        exact(FieldLabel::ClusterId, cluster_field, &cluster.id),
                        exact(FieldLabel::Namespace, namespace_field, &sa.namespace),
                        exact(FieldLabel::ServiceAccount, sa_field, &sa.name),
                    ])));
                }
            }
            if !subjects.is_empty() {
                tracing::info!(
                    cluster = %cluster.id,
                    count = subjects.len(),
                    threshold = %threshold,
                    "service accounts above permission threshold"
                );
            }
            per_cluster.push(Query::any(subjects));
        }

        let query = Query::any(per_cluster).unwrap_or_else(|| {
            tracing::debug!(
                threshold = %threshold,
                "no service account above permission threshold"
            );
            Query::Match(FieldQuery::new(
                FieldLabel::ServiceAccount,
                sa_field,
                Operation::Never,
            ))
        });
        Ok(Some(Built {
            query,
            printer: Printer::fixed(message(threshold)),
        }))
    }
}

fn exact(label: FieldLabel, metadata: &FieldMetadata, value: &str) -> Query {
    Query::Match(FieldQuery::new(
        label,
        metadata,
        Operation::Exact(value.to_string()),
    ))
}

fn message(threshold: PermissionLevel) -> String {
    format!(
        "Service account permission level is above the threshold of {}",
        threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::PermissionPolicy;
    use kd_model::{Cluster, MemoryStore};

    fn fields(level: PermissionLevel) -> PolicyFields {
        PolicyFields {
            permission_policy: Some(PermissionPolicy {
                permission_level: level,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn no_subjects_above_threshold_never_matches() {
        let store = MemoryStore::new().with_cluster(Cluster {
            id: "c1".to_string(),
            name: "prod".to_string(),
        });
        let builder = RbacBuilder::new(RbacSources::from_store(Arc::new(store)));
        let built = builder
            .build(&fields(PermissionLevel::None), &FieldRegistry::standard())
            .unwrap()
            .unwrap();
        assert!(matches!(
            &built.query,
            Query::Match(f) if matches!(f.op, Operation::Never)
        ));

        let mut values = crate::search::FieldValues::new();
        values.push("deployment.cluster_id", "c1");
        values.push("deployment.service_account", "default");
        assert!(crate::engine::FieldEvaluator
            .evaluate_values(&built.query, &values)
            .is_none());
    }

    #[test]
    fn absent_permission_policy_skips_the_stores() {
        let builder = RbacBuilder::new(RbacSources::from_store(Arc::new(MemoryStore::new())));
        let built = builder
            .build(&PolicyFields::default(), &FieldRegistry::new())
            .unwrap();
        assert!(built.is_none());
    }

    #[test]
    fn message_names_threshold() {
        assert_eq!(
            message(PermissionLevel::ElevatedInNamespace),
            "Service account permission level is above the threshold of ELEVATED_IN_NAMESPACE"
        );
    }
}
