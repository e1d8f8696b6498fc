// search.rs — Flattening entities into attribute-path → values tables.
//
// The evaluator never walks entity structs directly. Each entity type
// flattens itself into `FieldValues`, keyed by the same attribute paths the
// field registry hands out. Repeated structures contribute one value per
// element in document order, and sibling paths under the same repeated
// element (e.g. every field of a vulnerability) always have equal length so
// linked queries can pair them by index.
//
// Dropped capabilities are the exception: each container contributes one
// value, its whole drop list joined with LIST_SEPARATOR, since the check is
// whether that container's list lacks a capability.

use std::collections::BTreeMap;

use kd_model::{Deployment, Image, ProcessIndicator};

use crate::registry::EntityKind;

/// Joins a per-container list into one row value.
pub const LIST_SEPARATOR: char = ',';

/// Flattened view of one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    values: BTreeMap<String, Vec<String>>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, value: impl Into<String>) {
        self.values
            .entry(path.to_string())
            .or_default()
            .push(value.into());
    }

    /// Values at `path`, empty if the entity has none.
    pub fn get(&self, path: &str) -> &[String] {
        self.values
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// An entity the predicate engine can evaluate.
pub trait Searchable {
    fn kind(&self) -> EntityKind;
    fn field_values(&self) -> FieldValues;
}

fn map_entry(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}

impl Searchable for Deployment {
    fn kind(&self) -> EntityKind {
        EntityKind::Deployment
    }

    fn field_values(&self) -> FieldValues {
        let mut fv = FieldValues::new();
        fv.push("deployment.id", self.id.as_str());
        fv.push("deployment.name", self.name.as_str());
        fv.push("deployment.namespace", self.namespace.as_str());
        fv.push("deployment.cluster_id", self.cluster_id.as_str());
        if !self.service_account.is_empty() {
            fv.push("deployment.service_account", self.service_account.as_str());
        }
        for (k, v) in &self.labels {
            fv.push("deployment.labels", map_entry(k, v));
        }
        for (k, v) in &self.annotations {
            fv.push("deployment.annotations", map_entry(k, v));
        }

        for container in &self.containers {
            let sc = &container.security_context;
            fv.push(
                "deployment.containers.security_context.privileged",
                sc.privileged.to_string(),
            );
            fv.push(
                "deployment.containers.security_context.read_only_root_filesystem",
                sc.read_only_root_filesystem.to_string(),
            );
            for cap in &sc.add_capabilities {
                fv.push("deployment.containers.security_context.add_capabilities", cap.as_str());
            }
            fv.push(
                "deployment.containers.security_context.drop_capabilities",
                sc.drop_capabilities.join(&LIST_SEPARATOR.to_string()),
            );
            for env in &container.config.env {
                fv.push("deployment.containers.config.env", map_entry(&env.key, &env.value));
            }

            let res = &container.resources;
            fv.push(
                "deployment.containers.resources.cpu_cores_request",
                res.cpu_cores_request.to_string(),
            );
            fv.push(
                "deployment.containers.resources.cpu_cores_limit",
                res.cpu_cores_limit.to_string(),
            );
            fv.push(
                "deployment.containers.resources.memory_mb_request",
                res.memory_mb_request.to_string(),
            );
            fv.push(
                "deployment.containers.resources.memory_mb_limit",
                res.memory_mb_limit.to_string(),
            );

            for volume in &container.volumes {
                fv.push("deployment.containers.volumes.name", volume.name.as_str());
                fv.push("deployment.containers.volumes.source", volume.source.as_str());
                fv.push(
                    "deployment.containers.volumes.destination",
                    volume.destination.as_str(),
                );
                fv.push(
                    "deployment.containers.volumes.read_only",
                    volume.read_only.to_string(),
                );
                fv.push("deployment.containers.volumes.type", volume.volume_type.as_str());
            }
        }

        for port in &self.ports {
            fv.push("deployment.ports.container_port", port.container_port.to_string());
            fv.push("deployment.ports.protocol", port.protocol.as_str());
            fv.push("deployment.ports.exposure", port.exposure.as_str());
        }
        fv
    }
}

impl Searchable for Image {
    fn kind(&self) -> EntityKind {
        EntityKind::Image
    }

    fn field_values(&self) -> FieldValues {
        let mut fv = FieldValues::new();
        fv.push("image.id", self.id.as_str());
        fv.push("image.name.registry", self.name.registry.as_str());
        fv.push("image.name.remote", self.name.remote.as_str());
        fv.push("image.name.tag", self.name.tag.as_str());

        if let Some(metadata) = &self.metadata {
            if let Some(created) = metadata.created {
                fv.push("image.metadata.created", created.to_rfc3339());
            }
            for layer in &metadata.layers {
                fv.push("image.metadata.layers.instruction", layer.instruction.as_str());
                fv.push("image.metadata.layers.value", layer.value.as_str());
            }
            for (k, v) in &metadata.labels {
                fv.push("image.metadata.labels", map_entry(k, v));
            }
        }

        if let Some(scan) = &self.scan {
            if let Some(scan_time) = scan.scan_time {
                fv.push("image.scan.scan_time", scan_time.to_rfc3339());
            }
            for component in &scan.components {
                fv.push("image.scan.components.name", component.name.as_str());
                fv.push("image.scan.components.version", component.version.as_str());
                for vuln in &component.vulns {
                    fv.push("image.scan.components.vulns.cve", vuln.cve.as_str());
                    fv.push("image.scan.components.vulns.cvss", vuln.cvss.to_string());
                    fv.push("image.scan.components.vulns.link", vuln.link.as_str());
                    fv.push(
                        "image.scan.components.vulns.fixed_by",
                        vuln.fixed_by.clone().unwrap_or_default(),
                    );
                }
            }
        }
        fv
    }
}

impl Searchable for ProcessIndicator {
    fn kind(&self) -> EntityKind {
        EntityKind::Process
    }

    fn field_values(&self) -> FieldValues {
        let mut fv = FieldValues::new();
        fv.push("process.deployment_id", self.deployment_id.as_str());
        fv.push("process.container_name", self.container_name.as_str());
        fv.push("process.signal.name", self.signal.name.as_str());
        fv.push("process.signal.args", self.signal.args.as_str());
        fv.push("process.signal.exec_file_path", self.signal.exec_file_path.as_str());
        fv.push("process.signal.uid", self.signal.uid.to_string());
        fv
    }
}
