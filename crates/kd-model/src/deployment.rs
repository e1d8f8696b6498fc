// deployment.rs — Deployment and container records.
//
// A Deployment is the unit policies are evaluated against. It carries its
// cluster/namespace placement, the service account its pods run as, and one
// record per container with security context, resources and volumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::image::ImageName;

/// A Kubernetes workload as seen by the policy engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Name of the service account the pods run as (namespace is the
    /// deployment's own).
    #[serde(default)]
    pub service_account: String,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

/// One container in a deployment's pod template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub image: ContainerImage,
    #[serde(default)]
    pub security_context: SecurityContext,
    #[serde(default)]
    pub config: ContainerConfig,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

/// Reference from a container to the image it runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerImage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: ImageName,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityContext {
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub read_only_root_filesystem: bool,
    #[serde(default)]
    pub add_capabilities: Vec<String>,
    #[serde(default)]
    pub drop_capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerConfig {
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// CPU is in cores, memory in megabytes. Zero means unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Resources {
    #[serde(default)]
    pub cpu_cores_request: f64,
    #[serde(default)]
    pub cpu_cores_limit: f64,
    #[serde(default)]
    pub memory_mb_request: f64,
    #[serde(default)]
    pub memory_mb_limit: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub read_only: bool,
    /// Volume kind, e.g. `HostPath`, `Secret`, `EmptyDir`.
    #[serde(default)]
    pub volume_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortConfig {
    #[serde(default)]
    pub name: String,
    pub container_port: u32,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub exposure: ExposureLevel,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// How far a port is reachable from outside the pod.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExposureLevel {
    #[default]
    Unset,
    Internal,
    Node,
    External,
    Host,
}

impl ExposureLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureLevel::Unset => "UNSET",
            ExposureLevel::Internal => "INTERNAL",
            ExposureLevel::Node => "NODE",
            ExposureLevel::External => "EXTERNAL",
            ExposureLevel::Host => "HOST",
        }
    }
}

impl std::fmt::Display for ExposureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_deserializes_with_defaults() {
        let json = r#"{
            "id": "dep-1",
            "name": "web",
            "namespace": "prod",
            "cluster_id": "c1",
            "containers": [{"name": "nginx"}],
            "ports": [{"container_port": 22}]
        }"#;
        let dep: Deployment = serde_json::from_str(json).unwrap();
        assert_eq!(dep.containers.len(), 1);
        assert!(!dep.containers[0].security_context.privileged);
        assert_eq!(dep.ports[0].protocol, "TCP");
        assert_eq!(dep.ports[0].exposure, ExposureLevel::Unset);
        assert!(dep.labels.is_empty());
    }

    #[test]
    fn exposure_level_uses_upper_case_names() {
        let level: ExposureLevel = serde_json::from_str("\"EXTERNAL\"").unwrap();
        assert_eq!(level, ExposureLevel::External);
        assert_eq!(level.to_string(), "EXTERNAL");
    }
}
