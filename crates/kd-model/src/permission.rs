// permission.rs — The RBAC permission bucket lattice.
//
// Buckets are a total order. A subject's bucket is the highest one any of its
// bindings reaches, so the evaluator only ever needs `max()` and `>`.

use serde::{Deserialize, Serialize};

/// How much Kubernetes API access a subject has, coarsened into buckets.
///
/// Variant order is significant: `derive(PartialOrd, Ord)` compares by
/// declaration order, giving `None < Default < ... < ClusterAdmin`.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    /// No grant applies to the subject.
    #[default]
    None,
    /// Read access (get/list/watch) inside some namespace.
    Default,
    /// Write access, or `list` on every resource, inside some namespace.
    ElevatedInNamespace,
    /// Non-trivial read or write access across the whole cluster.
    ElevatedClusterWide,
    /// Every verb on every resource cluster-wide.
    ClusterAdmin,
}

impl PermissionLevel {
    /// All levels in ascending order.
    pub const ALL: [PermissionLevel; 5] = [
        PermissionLevel::None,
        PermissionLevel::Default,
        PermissionLevel::ElevatedInNamespace,
        PermissionLevel::ElevatedClusterWide,
        PermissionLevel::ClusterAdmin,
    ];

    /// Wire name, e.g. `ELEVATED_IN_NAMESPACE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::None => "NONE",
            PermissionLevel::Default => "DEFAULT",
            PermissionLevel::ElevatedInNamespace => "ELEVATED_IN_NAMESPACE",
            PermissionLevel::ElevatedClusterWide => "ELEVATED_CLUSTER_WIDE",
            PermissionLevel::ClusterAdmin => "CLUSTER_ADMIN",
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
