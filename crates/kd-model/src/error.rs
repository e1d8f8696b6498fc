// error.rs — Error types for the store collaborators.

use thiserror::Error;

/// Errors returned by the cluster/role/binding/service-account stores.
///
/// The policy compiler never retries these; they surface unchanged as
/// compilation failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Listing objects of one kind for a cluster failed.
    #[error("failed to list {kind} for cluster '{cluster_id}': {reason}")]
    ListFailed {
        kind: &'static str,
        cluster_id: String,
        reason: String,
    },

    /// Listing the known clusters failed.
    #[error("failed to list clusters: {reason}")]
    ClustersUnavailable { reason: String },
}
