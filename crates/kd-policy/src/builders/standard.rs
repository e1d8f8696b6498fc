// builders/standard.rs — The default list of top-level builders.
//
// The compiler conjoins every builder in this list. Families with several
// optional parts (image name, component, port, process) are conjunctions of
// their parts. Volume parts are linked so they must hold on one volume.
// Container resources are a disjunction: exceeding any one limit is a
// violation.

use super::{
    CapabilitiesBuilder, CapabilityList, CveBuilder, CvssBuilder, DaysBuilder,
    DockerfileLineBuilder, ExactBuilder, FieldBuilder, FixedByBuilder, FlagBuilder,
    HostMountBuilder, MapBuilder, MapRequirement, MissingBuilder, NumericBuilder, ProcessBuilder,
    RegexBuilder, VolumeBuilder,
};
use crate::registry::FieldLabel;
use crate::spec::{NumericalPolicy, PolicyFields, ResourcePolicy};

/// An ordered list of builders run by the compiler.
#[derive(Debug, Clone, Default)]
pub struct BuilderRegistry {
    builders: Vec<FieldBuilder>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, builder: FieldBuilder) {
        self.builders.push(builder);
    }

    pub fn builders(&self) -> &[FieldBuilder] {
        &self.builders
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Every field family, in message order.
    pub fn standard() -> Self {
        let builders = vec![
            image_name(),
            FieldBuilder::Days(DaysBuilder {
                name: "image age",
                label: FieldLabel::ImageCreatedTime,
                message_label: "Time of image creation",
                source: |f| f.image_age_days,
            }),
            FieldBuilder::DockerfileLine(DockerfileLineBuilder),
            FieldBuilder::Cve(CveBuilder),
            FieldBuilder::Cvss(CvssBuilder),
            FieldBuilder::FixedBy(FixedByBuilder),
            component(),
            FieldBuilder::Days(DaysBuilder {
                name: "scan age",
                label: FieldLabel::ImageScanTime,
                message_label: "Time of last scan",
                source: |f| f.scan_age_days,
            }),
            FieldBuilder::Missing(MissingBuilder {
                name: "no scan exists",
                label: FieldLabel::ImageScanTime,
                message: "Image has not been scanned",
                source: |f| f.no_scan_exists,
            }),
            FieldBuilder::Map(MapBuilder {
                name: "environment variable",
                label: FieldLabel::EnvironmentVariable,
                requirement: MapRequirement::Disallowed,
                subject: "Container Environment",
                policy_label: "environment policy",
                source: |f| f.env.clone(),
            }),
            FieldBuilder::Volume(VolumeBuilder),
            port(),
            FieldBuilder::Regex(RegexBuilder {
                name: "port exposure",
                label: FieldLabel::PortExposure,
                message_label: "Exposure type",
                substring: false,
                source: exposure_pattern,
            }),
            FieldBuilder::Map(MapBuilder {
                name: "required label",
                label: FieldLabel::DeploymentLabel,
                requirement: MapRequirement::Required,
                subject: "label",
                policy_label: "required label policy",
                source: |f| f.required_label.clone(),
            }),
            FieldBuilder::Map(MapBuilder {
                name: "required annotation",
                label: FieldLabel::DeploymentAnnotation,
                requirement: MapRequirement::Required,
                subject: "annotation",
                policy_label: "required annotation policy",
                source: |f| f.required_annotation.clone(),
            }),
            FieldBuilder::Map(MapBuilder {
                name: "disallowed annotation",
                label: FieldLabel::DeploymentAnnotation,
                requirement: MapRequirement::Disallowed,
                subject: "Disallowed annotation",
                policy_label: "disallowed annotation policy",
                source: |f| f.disallowed_annotation.clone(),
            }),
            FieldBuilder::Map(MapBuilder {
                name: "required image label",
                label: FieldLabel::ImageLabel,
                requirement: MapRequirement::Required,
                subject: "image label",
                policy_label: "required image label policy",
                source: |f| f.required_image_label.clone(),
            }),
            FieldBuilder::Map(MapBuilder {
                name: "disallowed image label",
                label: FieldLabel::ImageLabel,
                requirement: MapRequirement::Disallowed,
                subject: "Disallowed image label",
                policy_label: "disallowed image label policy",
                source: |f| f.disallowed_image_label.clone(),
            }),
            FieldBuilder::Flag(FlagBuilder {
                name: "privileged",
                label: FieldLabel::Privileged,
                when_true: "Privileged container found",
                when_false: "Unprivileged container found",
                source: |f| f.privileged,
            }),
            process(),
            FieldBuilder::HostMount(HostMountBuilder),
            FieldBuilder::Flag(FlagBuilder {
                name: "read-only root filesystem",
                label: FieldLabel::ReadOnlyRootFilesystem,
                when_true: "Container using read-only root filesystem found",
                when_false: "Container using read-write root filesystem found",
                source: |f| f.read_only_root_fs,
            }),
            FieldBuilder::Capabilities(CapabilitiesBuilder::new(CapabilityList::Drop)),
            FieldBuilder::Capabilities(CapabilitiesBuilder::new(CapabilityList::Add)),
            resources(),
        ];
        Self { builders }
    }
}

fn image_name() -> FieldBuilder {
    FieldBuilder::Conjunction(vec![
        FieldBuilder::Regex(RegexBuilder {
            name: "image registry",
            label: FieldLabel::ImageRegistry,
            message_label: "Image registry",
            substring: false,
            source: |f| f.image_name.as_ref().and_then(|n| n.registry.clone()),
        }),
        FieldBuilder::Regex(RegexBuilder {
            name: "image remote",
            label: FieldLabel::ImageRemote,
            message_label: "Image remote",
            substring: true,
            source: |f| f.image_name.as_ref().and_then(|n| n.remote.clone()),
        }),
        FieldBuilder::Regex(RegexBuilder {
            name: "image tag",
            label: FieldLabel::ImageTag,
            message_label: "Image tag",
            substring: false,
            source: |f| f.image_name.as_ref().and_then(|n| n.tag.clone()),
        }),
    ])
}

fn component() -> FieldBuilder {
    FieldBuilder::Conjunction(vec![
        FieldBuilder::Regex(RegexBuilder {
            name: "component name",
            label: FieldLabel::Component,
            message_label: "Component name",
            substring: false,
            source: |f| f.component.as_ref().and_then(|c| c.name.clone()),
        }),
        FieldBuilder::Regex(RegexBuilder {
            name: "component version",
            label: FieldLabel::ComponentVersion,
            message_label: "Component version",
            substring: false,
            source: |f| f.component.as_ref().and_then(|c| c.version.clone()),
        }),
    ])
}

fn port() -> FieldBuilder {
    FieldBuilder::Conjunction(vec![
        FieldBuilder::Exact(ExactBuilder {
            name: "port",
            label: FieldLabel::Port,
            message_label: "Port",
            source: |f| {
                f.port_policy
                    .as_ref()
                    .and_then(|p| p.port)
                    .map(|p| p.to_string())
            },
        }),
        FieldBuilder::Regex(RegexBuilder {
            name: "protocol",
            label: FieldLabel::Protocol,
            message_label: "Protocol",
            substring: false,
            source: |f| f.port_policy.as_ref().and_then(|p| p.protocol.clone()),
        }),
    ])
}

fn process() -> FieldBuilder {
    FieldBuilder::Conjunction(vec![
        FieldBuilder::Process(ProcessBuilder {
            name: "process name",
            label: FieldLabel::ProcessName,
            attribute: "name",
            source: |f| f.process_policy.as_ref().and_then(|p| p.name.clone()),
        }),
        FieldBuilder::Process(ProcessBuilder {
            name: "process arguments",
            label: FieldLabel::ProcessArguments,
            attribute: "args",
            source: |f| f.process_policy.as_ref().and_then(|p| p.args.clone()),
        }),
    ])
}

fn resources() -> FieldBuilder {
    FieldBuilder::Disjunction(vec![
        FieldBuilder::Numeric(NumericBuilder {
            name: "cpu resource request",
            label: FieldLabel::CpuCoresRequest,
            description: "CPU resource request",
            source: |f| resource(f, |r| r.cpu_resource_request),
        }),
        FieldBuilder::Numeric(NumericBuilder {
            name: "cpu resource limit",
            label: FieldLabel::CpuCoresLimit,
            description: "CPU resource limit",
            source: |f| resource(f, |r| r.cpu_resource_limit),
        }),
        FieldBuilder::Numeric(NumericBuilder {
            name: "memory resource request",
            label: FieldLabel::MemoryRequest,
            description: "memory resource request",
            source: |f| resource(f, |r| r.memory_resource_request),
        }),
        FieldBuilder::Numeric(NumericBuilder {
            name: "memory resource limit",
            label: FieldLabel::MemoryLimit,
            description: "memory resource limit",
            source: |f| resource(f, |r| r.memory_resource_limit),
        }),
    ])
}

fn resource(
    fields: &PolicyFields,
    pick: impl Fn(&ResourcePolicy) -> Option<NumericalPolicy>,
) -> Option<NumericalPolicy> {
    fields.container_resource_policy.as_ref().and_then(pick)
}

/// Alternation of the requested exposure levels, or `None` when the list
/// is empty.
fn exposure_pattern(fields: &PolicyFields) -> Option<String> {
    if fields.port_exposure.is_empty() {
        return None;
    }
    let names: Vec<&str> = fields.port_exposure.iter().map(|e| e.as_str()).collect();
    Some(names.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldRegistry;
    use kd_model::ExposureLevel;

    #[test]
    fn standard_list_covers_every_family() {
        let registry = BuilderRegistry::standard();
        assert_eq!(registry.len(), 25);
        let names: Vec<&str> = registry.builders().iter().map(|b| b.name()).collect();
        assert!(names.contains(&"dockerfile line"));
        assert!(names.contains(&"add capabilities"));
        assert!(names.contains(&"drop capabilities"));
        assert!(!names.contains(&"rbac permission level"));
    }

    #[test]
    fn exposure_levels_become_alternation() {
        let fields = PolicyFields {
            port_exposure: vec![ExposureLevel::External, ExposureLevel::Node],
            ..Default::default()
        };
        assert_eq!(exposure_pattern(&fields).as_deref(), Some("EXTERNAL|NODE"));
        assert!(exposure_pattern(&PolicyFields::default()).is_none());
    }

    #[test]
    fn resources_build_a_disjunction() {
        let fields = PolicyFields {
            container_resource_policy: Some(ResourcePolicy {
                cpu_resource_limit: Some(NumericalPolicy {
                    op: crate::spec::Comparator::GreaterThan,
                    value: 2.0,
                }),
                memory_resource_limit: Some(NumericalPolicy {
                    op: crate::spec::Comparator::GreaterThan,
                    value: 1024.0,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let built = resources()
            .build(&fields, &FieldRegistry::standard())
            .unwrap()
            .unwrap();
        assert!(matches!(built.query, crate::query::Query::Disjunction(ref c) if c.len() == 2));
    }
}
