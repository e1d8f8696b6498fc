//! # kd-model
//!
//! Entity model shared by the kube-detect crates.
//!
//! Holds the plain data records the policy engine reads: deployments and
//! their containers, container images with scan results, observed process
//! indicators, and the Kubernetes RBAC objects (roles, bindings, service
//! accounts) grouped per cluster. It also defines the store traits through
//! which RBAC snapshots are pulled, plus an in-memory store.
//!
//! ## Key invariants
//!
//! - **Cluster-scoped RBAC objects apply everywhere**: a role or binding with
//!   `cluster_role = true` applies to every namespace of its cluster.
//! - **Permission levels are totally ordered**: [`PermissionLevel`] derives
//!   `Ord`, so "maximum reachable privilege" is just `max()`.

pub mod deployment;
pub mod error;
pub mod image;
pub mod permission;
pub mod process;
pub mod rbac;
pub mod store;

pub use deployment::{
    Container, ContainerConfig, ContainerImage, Deployment, EnvVar, ExposureLevel, PortConfig,
    Resources, SecurityContext, Volume,
};
pub use error::StoreError;
pub use image::{Component, Image, ImageLayer, ImageMetadata, ImageName, ImageScan, Vulnerability};
pub use permission::PermissionLevel;
pub use process::{ProcessIndicator, ProcessSignal};
pub use rbac::{Cluster, K8sRole, K8sRoleBinding, PolicyRule, ServiceAccount, Subject, SubjectKind};
pub use store::{ClusterStore, MemoryStore, RoleBindingStore, RoleStore, ServiceAccountStore};
