// store.rs — Store traits for the RBAC snapshot, and an in-memory backend.
//
// The policy compiler pulls a fresh snapshot of clusters, roles, bindings and
// service accounts through these traits every time it compiles an RBAC
// policy. Real deployments back them with a datastore; tests and embedders
// use MemoryStore.

use crate::error::StoreError;
use crate::rbac::{Cluster, K8sRole, K8sRoleBinding, ServiceAccount};

/// Lists the clusters known to the platform.
pub trait ClusterStore: Send + Sync {
    fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError>;
}

/// Lists roles and cluster roles belonging to one cluster.
pub trait RoleStore: Send + Sync {
    fn list_roles(&self, cluster_id: &str) -> Result<Vec<K8sRole>, StoreError>;
}

/// Lists role bindings and cluster role bindings belonging to one cluster.
pub trait RoleBindingStore: Send + Sync {
    fn list_bindings(&self, cluster_id: &str) -> Result<Vec<K8sRoleBinding>, StoreError>;
}

/// Lists service accounts belonging to one cluster.
pub trait ServiceAccountStore: Send + Sync {
    fn list_service_accounts(&self, cluster_id: &str) -> Result<Vec<ServiceAccount>, StoreError>;
}

/// In-memory implementation of every store trait.
///
/// Populate it up front with the `with_*` builders; lookups filter by
/// `cluster_id`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    clusters: Vec<Cluster>,
    roles: Vec<K8sRole>,
    bindings: Vec<K8sRoleBinding>,
    service_accounts: Vec<ServiceAccount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    pub fn with_role(mut self, role: K8sRole) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_binding(mut self, binding: K8sRoleBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_service_account(mut self, service_account: ServiceAccount) -> Self {
        self.service_accounts.push(service_account);
        self
    }
}

impl ClusterStore for MemoryStore {
    fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        Ok(self.clusters.clone())
    }
}

impl RoleStore for MemoryStore {
    fn list_roles(&self, cluster_id: &str) -> Result<Vec<K8sRole>, StoreError> {
        Ok(self
            .roles
            .iter()
            .filter(|r| r.cluster_id == cluster_id)
            .cloned()
            .collect())
    }
}

impl RoleBindingStore for MemoryStore {
    fn list_bindings(&self, cluster_id: &str) -> Result<Vec<K8sRoleBinding>, StoreError> {
        Ok(self
            .bindings
            .iter()
            .filter(|b| b.cluster_id == cluster_id)
            .cloned()
            .collect())
    }
}

impl ServiceAccountStore for MemoryStore {
    fn list_service_accounts(&self, cluster_id: &str) -> Result<Vec<ServiceAccount>, StoreError> {
        Ok(self
            .service_accounts
            .iter()
            .filter(|sa| sa.cluster_id == cluster_id)
            .cloned()
            .collect())
    }
}
