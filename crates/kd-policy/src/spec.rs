// spec.rs — Policy documents as loaded from YAML.
//
// A Policy names one optional sub-record per field family. Only populated
// sub-records take part in compilation; an absent one means "this family
// contributes nothing". The document is read-only for the lifetime of a
// compile and is usually loaded from YAML:
//
// ```yaml
// name: "No privileged containers"
// severity: high
// scope:
//   - cluster: "prod"
//     namespace: "payments"
// fields:
//   privileged: true
//   add_capabilities: ["SYS_ADMIN"]
// ```

use std::path::Path;

use kd_model::{ExposureLevel, PermissionLevel};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// A declarative security policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    /// Where the policy applies. Empty means everywhere.
    #[serde(default)]
    pub scope: Vec<Scope>,
    #[serde(default)]
    pub fields: Option<PolicyFields>,
}

impl Policy {
    /// Parse a policy from YAML (JSON is accepted too, being a YAML subset).
    pub fn from_yaml(content: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read and parse a policy file.
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

/// One scope entry. Each set field narrows the entry; unset fields match
/// anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scope {
    /// Cluster id.
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub label: Option<KeyValuePolicy>,
}

/// Per-family constraints. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyFields {
    pub image_name: Option<ImageNamePolicy>,
    pub image_age_days: Option<i64>,
    pub line_rule: Option<DockerfileLineRule>,
    pub cve: Option<String>,
    pub cvss: Option<NumericalPolicy>,
    pub fixed_by: Option<String>,
    pub component: Option<ComponentPolicy>,
    pub scan_age_days: Option<i64>,
    pub no_scan_exists: Option<bool>,
    pub env: Option<KeyValuePolicy>,
    pub volume_policy: Option<VolumePolicy>,
    pub port_policy: Option<PortPolicy>,
    pub port_exposure: Vec<ExposureLevel>,
    pub required_label: Option<KeyValuePolicy>,
    pub required_annotation: Option<KeyValuePolicy>,
    pub disallowed_annotation: Option<KeyValuePolicy>,
    pub required_image_label: Option<KeyValuePolicy>,
    pub disallowed_image_label: Option<KeyValuePolicy>,
    pub privileged: Option<bool>,
    pub process_policy: Option<ProcessPolicy>,
    pub host_mount_policy: Option<HostMountPolicy>,
    pub read_only_root_fs: Option<bool>,
    pub add_capabilities: Vec<String>,
    pub drop_capabilities: Vec<String>,
    pub container_resource_policy: Option<ResourcePolicy>,
    pub permission_policy: Option<PermissionPolicy>,
}

impl PolicyFields {
    /// True when no sub-record is populated.
    pub fn is_empty(&self) -> bool {
        *self == PolicyFields::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImageNamePolicy {
    pub registry: Option<String>,
    /// Matched as a substring of the image remote.
    pub remote: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerfileLineRule {
    pub instruction: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComponentPolicy {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// A key/value constraint. Both parts are regular expressions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeyValuePolicy {
    pub key: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VolumePolicy {
    pub name: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub read_only: Option<bool>,
    pub volume_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortPolicy {
    pub port: Option<u32>,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProcessPolicy {
    pub name: Option<String>,
    pub args: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostMountPolicy {
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourcePolicy {
    pub cpu_resource_request: Option<NumericalPolicy>,
    pub cpu_resource_limit: Option<NumericalPolicy>,
    pub memory_resource_request: Option<NumericalPolicy>,
    pub memory_resource_limit: Option<NumericalPolicy>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionPolicy {
    /// Highest permission level a deployment's service account may hold.
    pub permission_level: PermissionLevel,
}

/// A threshold comparison, e.g. "CVSS >= 7".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NumericalPolicy {
    pub op: Comparator,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    LessThan,
    LessThanOrEquals,
    Equals,
    GreaterThanOrEquals,
    GreaterThan,
}

impl Comparator {
    /// Apply the comparison `value <op> threshold`.
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::LessThan => value < threshold,
            Comparator::LessThanOrEquals => value <= threshold,
            Comparator::Equals => (value - threshold).abs() < f64::EPSILON,
            Comparator::GreaterThanOrEquals => value >= threshold,
            Comparator::GreaterThan => value > threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::LessThan => "<",
            Comparator::LessThanOrEquals => "<=",
            Comparator::Equals => "=",
            Comparator::GreaterThanOrEquals => ">=",
            Comparator::GreaterThan => ">",
        }
    }

    /// Readable form used in violation messages.
    pub fn words(&self) -> &'static str {
        match self {
            Comparator::LessThan => "less than",
            Comparator::LessThanOrEquals => "less than or equal to",
            Comparator::Equals => "equal to",
            Comparator::GreaterThanOrEquals => "greater than or equal to",
            Comparator::GreaterThan => "greater than",
        }
    }
}
