// builders/mod.rs — Field builders: policy sub-record → predicate + printer.
//
// Every field family has one builder. Builders form a closed enum so the
// set is exhaustive and dispatch goes through a single `build`. The
// contract:
//
// - sub-record absent/empty → Ok(None), never an error;
// - sub-record present, field missing or unstored in the registry → Err
//   naming the builder and the field;
// - otherwise → Ok(Some(Built)) with a non-empty predicate and a printer
//   that renders messages from the predicate's highlights.
//
// `FieldBuilder::build` keys each leaf builder's highlights with the
// builder's name. A printer only ever reads what its own builder matched,
// even when another builder tests the same attribute path.

mod capabilities;
mod combinator;
mod field;
mod linked;
mod map;
mod rbac;
mod standard;

pub use capabilities::{CapabilitiesBuilder, CapabilityList};
pub use field::{
    DaysBuilder, ExactBuilder, FlagBuilder, MissingBuilder, NumericBuilder, ProcessBuilder,
    RegexBuilder,
};
pub use linked::{
    CveBuilder, CvssBuilder, DockerfileLineBuilder, FixedByBuilder, HostMountBuilder,
    VolumeBuilder,
};
pub use map::{MapBuilder, MapRequirement};
pub use rbac::{RbacBuilder, RbacSources};
pub use standard::BuilderRegistry;

use regex::Regex;

use crate::error::PolicyError;
use crate::printer::Printer;
use crate::query::Query;
use crate::registry::FieldRegistry;
use crate::spec::PolicyFields;

/// The output of a builder that had something to check.
#[derive(Debug, Clone)]
pub struct Built {
    pub query: Query,
    pub printer: Printer,
}

impl Built {
    fn keyed(mut self, builder: &str) -> Self {
        self.query.key_highlights(builder);
        self.printer.key_highlights(builder);
        self
    }
}

/// One builder per field family, plus the two combinators.
#[derive(Debug, Clone)]
pub enum FieldBuilder {
    Regex(RegexBuilder),
    Exact(ExactBuilder),
    Numeric(NumericBuilder),
    Days(DaysBuilder),
    Flag(FlagBuilder),
    Missing(MissingBuilder),
    Process(ProcessBuilder),
    Capabilities(CapabilitiesBuilder),
    Map(MapBuilder),
    DockerfileLine(DockerfileLineBuilder),
    Cve(CveBuilder),
    Cvss(CvssBuilder),
    FixedBy(FixedByBuilder),
    HostMount(HostMountBuilder),
    Volume(VolumeBuilder),
    Rbac(RbacBuilder),
    Conjunction(Vec<FieldBuilder>),
    Disjunction(Vec<FieldBuilder>),
}

impl FieldBuilder {
    /// Name used in error messages and logs.
    pub fn name(&self) -> &'static str {
        match self {
            FieldBuilder::Regex(b) => b.name,
            FieldBuilder::Exact(b) => b.name,
            FieldBuilder::Numeric(b) => b.name,
            FieldBuilder::Days(b) => b.name,
            FieldBuilder::Flag(b) => b.name,
            FieldBuilder::Missing(b) => b.name,
            FieldBuilder::Process(b) => b.name,
            FieldBuilder::Capabilities(b) => b.name(),
            FieldBuilder::Map(b) => b.name,
            FieldBuilder::DockerfileLine(_) => linked::DOCKERFILE_LINE,
            FieldBuilder::Cve(_) => linked::CVE,
            FieldBuilder::Cvss(_) => linked::CVSS,
            FieldBuilder::FixedBy(_) => linked::FIXED_BY,
            FieldBuilder::HostMount(_) => linked::HOST_MOUNT,
            FieldBuilder::Volume(_) => linked::VOLUME,
            FieldBuilder::Rbac(_) => rbac::NAME,
            FieldBuilder::Conjunction(_) => "conjunction",
            FieldBuilder::Disjunction(_) => "disjunction",
        }
    }

    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let built = match self {
            FieldBuilder::Regex(b) => b.build(fields, registry),
            FieldBuilder::Exact(b) => b.build(fields, registry),
            FieldBuilder::Numeric(b) => b.build(fields, registry),
            FieldBuilder::Days(b) => b.build(fields, registry),
            FieldBuilder::Flag(b) => b.build(fields, registry),
            FieldBuilder::Missing(b) => b.build(fields, registry),
            FieldBuilder::Process(b) => b.build(fields, registry),
            FieldBuilder::Capabilities(b) => b.build(fields, registry),
            FieldBuilder::Map(b) => b.build(fields, registry),
            FieldBuilder::DockerfileLine(b) => b.build(fields, registry),
            FieldBuilder::Cve(b) => b.build(fields, registry),
            FieldBuilder::Cvss(b) => b.build(fields, registry),
            FieldBuilder::FixedBy(b) => b.build(fields, registry),
            FieldBuilder::HostMount(b) => b.build(fields, registry),
            FieldBuilder::Volume(b) => b.build(fields, registry),
            FieldBuilder::Rbac(b) => b.build(fields, registry),
            FieldBuilder::Conjunction(children) => {
                return combinator::build_conjunction(children, fields, registry);
            }
            FieldBuilder::Disjunction(children) => {
                return combinator::build_disjunction(children, fields, registry);
            }
        }?;
        Ok(built.map(|b| b.keyed(self.name())))
    }
}

/// Compile a policy value as a case-insensitive regex. Unless `substring`
/// is set the expression must match the whole value.
pub(crate) fn compile_regex(
    builder: &'static str,
    pattern: &str,
    substring: bool,
) -> Result<Regex, PolicyError> {
    let expr = if substring {
        pattern.to_string()
    } else {
        format!("^(?:{})$", pattern)
    };
    regex::RegexBuilder::new(&expr)
        .case_insensitive(true)
        .build()
        .map_err(|source| PolicyError::InvalidRegex {
            builder,
            pattern: pattern.to_string(),
            source,
        })
}

/// Treat empty policy strings as unset.
pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}
