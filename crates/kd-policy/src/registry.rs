// registry.rs — The field registry ("options map").
//
// Builders never hard-code attribute paths. They ask the registry for a
// field label and get back where the value lives in the flattened entity,
// whether it is stored (highlightable), its data type and which entity kind
// owns it. The registry is a plain value built by the caller's composition
// root and passed into the compiler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// The entity class an attribute path belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Deployment,
    Image,
    Process,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Boolean,
    Numeric,
    DateTime,
    /// `key=value` entries.
    Map,
}

/// Every field a builder may reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FieldLabel {
    // Deployment
    ClusterId,
    Namespace,
    ServiceAccount,
    DeploymentLabel,
    DeploymentAnnotation,
    EnvironmentVariable,
    VolumeName,
    VolumeSource,
    VolumeDestination,
    VolumeReadOnly,
    VolumeType,
    Port,
    Protocol,
    PortExposure,
    Privileged,
    ReadOnlyRootFilesystem,
    AddCapabilities,
    DropCapabilities,
    CpuCoresRequest,
    CpuCoresLimit,
    MemoryRequest,
    MemoryLimit,
    // Image
    ImageRegistry,
    ImageRemote,
    ImageTag,
    ImageCreatedTime,
    ImageLabel,
    DockerfileInstruction,
    DockerfileValue,
    Component,
    ComponentVersion,
    Cve,
    CveLink,
    Cvss,
    FixedBy,
    ImageScanTime,
    // Process
    ProcessName,
    ProcessArguments,
}

impl FieldLabel {
    /// Human-readable label, as shown in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldLabel::ClusterId => "Cluster ID",
            FieldLabel::Namespace => "Namespace",
            FieldLabel::ServiceAccount => "Service Account",
            FieldLabel::DeploymentLabel => "Label",
            FieldLabel::DeploymentAnnotation => "Annotation",
            FieldLabel::EnvironmentVariable => "Environment Variable",
            FieldLabel::VolumeName => "Volume Name",
            FieldLabel::VolumeSource => "Volume Source",
            FieldLabel::VolumeDestination => "Volume Destination",
            FieldLabel::VolumeReadOnly => "Volume ReadOnly",
            FieldLabel::VolumeType => "Volume Type",
            FieldLabel::Port => "Port",
            FieldLabel::Protocol => "Protocol",
            FieldLabel::PortExposure => "Port Exposure Method",
            FieldLabel::Privileged => "Privileged",
            FieldLabel::ReadOnlyRootFilesystem => "Read-Only Root Filesystem",
            FieldLabel::AddCapabilities => "Add Capabilities",
            FieldLabel::DropCapabilities => "Drop Capabilities",
            FieldLabel::CpuCoresRequest => "CPU Cores Request",
            FieldLabel::CpuCoresLimit => "CPU Cores Limit",
            FieldLabel::MemoryRequest => "Memory Request (MB)",
            FieldLabel::MemoryLimit => "Memory Limit (MB)",
            FieldLabel::ImageRegistry => "Image Registry",
            FieldLabel::ImageRemote => "Image Remote",
            FieldLabel::ImageTag => "Image Tag",
            FieldLabel::ImageCreatedTime => "Image Created Time",
            FieldLabel::ImageLabel => "Image Label",
            FieldLabel::DockerfileInstruction => "Dockerfile Instruction Keyword",
            FieldLabel::DockerfileValue => "Dockerfile Instruction Value",
            FieldLabel::Component => "Component",
            FieldLabel::ComponentVersion => "Component Version",
            FieldLabel::Cve => "CVE",
            FieldLabel::CveLink => "CVE Link",
            FieldLabel::Cvss => "CVSS",
            FieldLabel::FixedBy => "Fixed By",
            FieldLabel::ImageScanTime => "Image Scan Time",
            FieldLabel::ProcessName => "Process Name",
            FieldLabel::ProcessArguments => "Process Arguments",
        }
    }
}

impl std::fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field lives and how it may be used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Attribute path in the flattened entity, e.g. `image.name.tag`.
    pub path: String,
    /// Stored fields can be highlighted; unstored ones cannot back a
    /// violation message.
    pub stored: bool,
    pub data_type: DataType,
    pub kind: EntityKind,
}

impl FieldMetadata {
    pub fn new(path: &str, data_type: DataType, kind: EntityKind) -> Self {
        Self {
            path: path.to_string(),
            stored: true,
            data_type,
            kind,
        }
    }
}

/// Field label → metadata lookup table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRegistry {
    fields: BTreeMap<FieldLabel, FieldMetadata>,
}

impl FieldRegistry {
    /// An empty registry; every builder referencing a field will fail.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry covering every field the standard builders use.
    pub fn standard() -> Self {
        use DataType::*;
        use EntityKind::*;

        let table: &[(FieldLabel, &str, DataType, EntityKind)] = &[
            (FieldLabel::ClusterId, "deployment.cluster_id", String, Deployment),
            (FieldLabel::Namespace, "deployment.namespace", String, Deployment),
            (FieldLabel::ServiceAccount, "deployment.service_account", String, Deployment),
            (FieldLabel::DeploymentLabel, "deployment.labels", Map, Deployment),
            (FieldLabel::DeploymentAnnotation, "deployment.annotations", Map, Deployment),
            (FieldLabel::EnvironmentVariable, "deployment.containers.config.env", Map, Deployment),
            (FieldLabel::VolumeName, "deployment.containers.volumes.name", String, Deployment),
            (FieldLabel::VolumeSource, "deployment.containers.volumes.source", String, Deployment),
            (
                FieldLabel::VolumeDestination,
                "deployment.containers.volumes.destination",
                String,
                Deployment,
            ),
            (
                FieldLabel::VolumeReadOnly,
                "deployment.containers.volumes.read_only",
                Boolean,
                Deployment,
            ),
            (FieldLabel::VolumeType, "deployment.containers.volumes.type", String, Deployment),
            (FieldLabel::Port, "deployment.ports.container_port", Numeric, Deployment),
            (FieldLabel::Protocol, "deployment.ports.protocol", String, Deployment),
            (FieldLabel::PortExposure, "deployment.ports.exposure", String, Deployment),
            (
                FieldLabel::Privileged,
                "deployment.containers.security_context.privileged",
                Boolean,
                Deployment,
            ),
            (
                FieldLabel::ReadOnlyRootFilesystem,
                "deployment.containers.security_context.read_only_root_filesystem",
                Boolean,
                Deployment,
            ),
            (
                FieldLabel::AddCapabilities,
                "deployment.containers.security_context.add_capabilities",
                String,
                Deployment,
            ),
            (
                FieldLabel::DropCapabilities,
                "deployment.containers.security_context.drop_capabilities",
                String,
                Deployment,
            ),
            (
                FieldLabel::CpuCoresRequest,
                "deployment.containers.resources.cpu_cores_request",
                Numeric,
                Deployment,
            ),
            (
                FieldLabel::CpuCoresLimit,
                "deployment.containers.resources.cpu_cores_limit",
                Numeric,
                Deployment,
            ),
            (
                FieldLabel::MemoryRequest,
                "deployment.containers.resources.memory_mb_request",
                Numeric,
                Deployment,
            ),
            (
                FieldLabel::MemoryLimit,
                "deployment.containers.resources.memory_mb_limit",
                Numeric,
                Deployment,
            ),
            (FieldLabel::ImageRegistry, "image.name.registry", String, Image),
            (FieldLabel::ImageRemote, "image.name.remote", String, Image),
            (FieldLabel::ImageTag, "image.name.tag", String, Image),
            (FieldLabel::ImageCreatedTime, "image.metadata.created", DateTime, Image),
            (FieldLabel::ImageLabel, "image.metadata.labels", Map, Image),
            (
                FieldLabel::DockerfileInstruction,
                "image.metadata.layers.instruction",
                String,
                Image,
            ),
            (FieldLabel::DockerfileValue, "image.metadata.layers.value", String, Image),
            (FieldLabel::Component, "image.scan.components.name", String, Image),
            (FieldLabel::ComponentVersion, "image.scan.components.version", String, Image),
            (FieldLabel::Cve, "image.scan.components.vulns.cve", String, Image),
            (FieldLabel::CveLink, "image.scan.components.vulns.link", String, Image),
            (FieldLabel::Cvss, "image.scan.components.vulns.cvss", Numeric, Image),
            (FieldLabel::FixedBy, "image.scan.components.vulns.fixed_by", String, Image),
            (FieldLabel::ImageScanTime, "image.scan.scan_time", DateTime, Image),
            (FieldLabel::ProcessName, "process.signal.name", String, Process),
            (FieldLabel::ProcessArguments, "process.signal.args", String, Process),
        ];

        let fields = table
            .iter()
            .map(|(label, path, data_type, kind)| {
                (*label, FieldMetadata::new(path, *data_type, *kind))
            })
            .collect();
        Self { fields }
    }

    /// Register or replace a field.
    pub fn insert(&mut self, label: FieldLabel, metadata: FieldMetadata) {
        self.fields.insert(label, metadata);
    }

    /// Drop a field from the registry.
    pub fn remove(&mut self, label: FieldLabel) -> Option<FieldMetadata> {
        self.fields.remove(&label)
    }

    pub fn lookup(&self, label: FieldLabel) -> Option<&FieldMetadata> {
        self.fields.get(&label)
    }

    /// Look up a field a builder depends on, failing if it is missing or
    /// unstored.
    pub fn require(
        &self,
        builder: &'static str,
        label: FieldLabel,
    ) -> Result<&FieldMetadata, PolicyError> {
        let metadata = self.lookup(label).ok_or(PolicyError::UnknownField {
            builder,
            field: label,
        })?;
        if !metadata.stored {
            return Err(PolicyError::UnstoredField {
                builder,
                field: label,
            });
        }
        Ok(metadata)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
