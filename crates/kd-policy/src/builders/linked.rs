// builders/linked.rs — Builders over linked fields.
//
// A linked predicate tests several paths of the same sub-object at once,
// row by row: the n-th CVE belongs with the n-th CVSS score and link. The
// printers read the highlights back in the same column order.

use super::{compile_regex, non_empty, Built};
use crate::error::PolicyError;
use crate::printer::{LinkedTemplate, Printer, VolumeColumn};
use crate::query::{FieldQuery, Operation, Query};
use crate::registry::{FieldLabel, FieldRegistry};
use crate::spec::PolicyFields;

pub const DOCKERFILE_LINE: &str = "dockerfile line";
pub const CVE: &str = "cve";
pub const CVSS: &str = "cvss";
pub const FIXED_BY: &str = "fixed by";
pub const HOST_MOUNT: &str = "host mount";
pub const VOLUME: &str = "volume";

/// Resolve each column and wrap the result in a linked query + printer.
fn linked(
    builder: &'static str,
    registry: &FieldRegistry,
    columns: Vec<(FieldLabel, Operation)>,
    template: LinkedTemplate,
) -> Result<Built, PolicyError> {
    let mut queries = Vec::with_capacity(columns.len());
    for (label, op) in columns {
        let metadata = registry.require(builder, label)?;
        queries.push(FieldQuery::new(label, metadata, op));
    }
    let keys = queries.iter().map(|q| q.key.clone()).collect();
    Ok(Built {
        query: Query::Linked(queries),
        printer: Printer::Linked { keys, template },
    })
}

/// Instruction (anchored) and value (substring) of one image layer.
#[derive(Debug, Clone, Default)]
pub struct DockerfileLineBuilder;

impl DockerfileLineBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(rule) = fields.line_rule.as_ref() else {
            return Ok(None);
        };
        if rule.instruction.is_empty() && rule.value.is_empty() {
            return Ok(None);
        }
        let instruction = match rule.instruction.as_str() {
            "" => Operation::Any,
            i => Operation::Regex(compile_regex(DOCKERFILE_LINE, i, false)?),
        };
        let value = match rule.value.as_str() {
            "" => Operation::Any,
            v => Operation::Regex(compile_regex(DOCKERFILE_LINE, v, true)?),
        };
        linked(
            DOCKERFILE_LINE,
            registry,
            vec![
                (FieldLabel::DockerfileInstruction, instruction),
                (FieldLabel::DockerfileValue, value),
            ],
            LinkedTemplate::DockerfileLine {
                instruction: rule.instruction.clone(),
                value: rule.value.clone(),
            },
        )
        .map(Some)
    }
}

/// CVE identifier regex, carrying the vulnerability link along.
#[derive(Debug, Clone, Default)]
pub struct CveBuilder;

impl CveBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(pattern) = non_empty(fields.cve.as_ref()) else {
            return Ok(None);
        };
        linked(
            CVE,
            registry,
            vec![
                (
                    FieldLabel::Cve,
                    Operation::Regex(compile_regex(CVE, pattern, false)?),
                ),
                (FieldLabel::CveLink, Operation::Any),
            ],
            LinkedTemplate::Cve {
                pattern: pattern.to_string(),
            },
        )
        .map(Some)
    }
}

/// CVSS threshold on a vulnerability, narrowed by fixability when
/// `fixed_by` is also set.
#[derive(Debug, Clone, Default)]
pub struct CvssBuilder;

impl CvssBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(cvss) = fields.cvss else {
            return Ok(None);
        };
        let mut columns = vec![
            (
                FieldLabel::Cvss,
                Operation::Numeric {
                    comparator: cvss.op,
                    threshold: cvss.value,
                },
            ),
            (FieldLabel::Cve, Operation::Any),
        ];
        if let Some(fixed_by) = non_empty(fields.fixed_by.as_ref()) {
            columns.push((
                FieldLabel::FixedBy,
                Operation::Regex(compile_regex(CVSS, fixed_by, false)?),
            ));
        }
        linked(
            CVSS,
            registry,
            columns,
            LinkedTemplate::Cvss {
                comparator: cvss.op,
                threshold: cvss.value,
            },
        )
        .map(Some)
    }
}

/// Fixability on its own. Defers to [`CvssBuilder`] when a CVSS threshold
/// is set so the two do not report the same vulnerability twice.
#[derive(Debug, Clone, Default)]
pub struct FixedByBuilder;

impl FixedByBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        if fields.cvss.is_some() {
            return Ok(None);
        }
        let Some(pattern) = non_empty(fields.fixed_by.as_ref()) else {
            return Ok(None);
        };
        linked(
            FIXED_BY,
            registry,
            vec![
                (
                    FieldLabel::FixedBy,
                    Operation::Regex(compile_regex(FIXED_BY, pattern, false)?),
                ),
                (FieldLabel::Cve, Operation::Any),
            ],
            LinkedTemplate::FixedBy {
                pattern: pattern.to_string(),
            },
        )
        .map(Some)
    }
}

/// Host-path volumes with the requested read-only flag. An unset flag
/// looks for writable mounts.
#[derive(Debug, Clone, Default)]
pub struct HostMountBuilder;

impl HostMountBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(policy) = fields.host_mount_policy.as_ref() else {
            return Ok(None);
        };
        let read_only = policy.read_only.unwrap_or(false);
        linked(
            HOST_MOUNT,
            registry,
            vec![
                (FieldLabel::VolumeType, Operation::Exact("HostPath".to_string())),
                (FieldLabel::VolumeReadOnly, Operation::Exact(read_only.to_string())),
                (FieldLabel::VolumeSource, Operation::Any),
            ],
            LinkedTemplate::HostMount { read_only },
        )
        .map(Some)
    }
}

/// Every set part of a volume policy, tested against the same volume.
#[derive(Debug, Clone, Default)]
pub struct VolumeBuilder;

impl VolumeBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(policy) = fields.volume_policy.as_ref() else {
            return Ok(None);
        };
        let patterns = [
            (FieldLabel::VolumeName, "Volume name", &policy.name),
            (FieldLabel::VolumeSource, "Volume source", &policy.source),
            (FieldLabel::VolumeDestination, "Volume destination", &policy.destination),
            (FieldLabel::VolumeType, "Volume type", &policy.volume_type),
        ];

        let mut columns = Vec::new();
        let mut printed = Vec::new();
        for (label, message_label, pattern) in patterns {
            let Some(pattern) = non_empty(pattern.as_ref()) else {
                continue;
            };
            columns.push((
                label,
                Operation::Regex(compile_regex(VOLUME, pattern, false)?),
            ));
            printed.push(VolumeColumn::Matched {
                label: message_label.to_string(),
                pattern: pattern.to_string(),
            });
        }
        if let Some(read_only) = policy.read_only {
            columns.push((FieldLabel::VolumeReadOnly, Operation::Exact(read_only.to_string())));
            let message = if read_only {
                "Read-only volume found"
            } else {
                "Writable volume found"
            };
            printed.push(VolumeColumn::Flag {
                message: message.to_string(),
            });
        }
        if columns.is_empty() {
            return Ok(None);
        }

        linked(
            VOLUME,
            registry,
            columns,
            LinkedTemplate::Volume { columns: printed },
        )
        .map(Some)
    }
}
