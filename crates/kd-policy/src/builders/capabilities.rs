// builders/capabilities.rs — Linux capability add/drop checks.
//
// Capability names are compared case-insensitively with the `CAP_` prefix
// optional on both sides, so a policy naming `SYS_ADMIN` matches a container
// adding `CAP_SYS_ADMIN`.

use super::Built;
use crate::error::PolicyError;
use crate::printer::{FieldTemplate, Printer};
use crate::query::{FieldQuery, Operation, Query};
use crate::registry::{FieldLabel, FieldRegistry};
use crate::spec::PolicyFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityList {
    /// Violation when a container adds any listed capability.
    Add,
    /// Violation when a container fails to drop any listed capability.
    Drop,
}

#[derive(Debug, Clone)]
pub struct CapabilitiesBuilder {
    pub list: CapabilityList,
}

impl CapabilitiesBuilder {
    pub fn new(list: CapabilityList) -> Self {
        Self { list }
    }

    pub fn name(&self) -> &'static str {
        match self.list {
            CapabilityList::Add => "add capabilities",
            CapabilityList::Drop => "drop capabilities",
        }
    }

    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let (caps, label, list_name) = match self.list {
            CapabilityList::Add => (
                &fields.add_capabilities,
                FieldLabel::AddCapabilities,
                "ADD CAPABILITIES",
            ),
            CapabilityList::Drop => (
                &fields.drop_capabilities,
                FieldLabel::DropCapabilities,
                "DROP CAPABILITIES",
            ),
        };
        let caps: Vec<&str> = caps
            .iter()
            .map(|c| normalize(c))
            .filter(|c| !c.is_empty())
            .collect();
        if caps.is_empty() {
            return Ok(None);
        }
        let metadata = registry.require(self.name(), label)?;

        let query = match self.list {
            CapabilityList::Add => {
                let alternatives: Vec<String> = caps.iter().map(|c| regex::escape(c)).collect();
                let regex = capability_regex(self.name(), &alternatives.join("|"))?;
                Some(Query::Match(FieldQuery::new(label, metadata, Operation::Regex(regex))))
            }
            CapabilityList::Drop => {
                let mut leaves = Vec::with_capacity(caps.len());
                for cap in &caps {
                    let pattern = capability_regex(self.name(), &regex::escape(cap))?;
                    leaves.push(Some(Query::Match(FieldQuery::new(
                        label,
                        metadata,
                        Operation::Lacks {
                            pattern,
                            display: cap.to_string(),
                        },
                    ))));
                }
                Query::any(leaves)
            }
        };

        Ok(query.map(|query| Built {
            query,
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Capability {
                    list: list_name.to_string(),
                    present: self.list == CapabilityList::Add,
                },
            ),
        }))
    }
}

fn normalize(cap: &str) -> &str {
    let cap = cap.trim();
    if cap.len() >= 4 && cap[..4].eq_ignore_ascii_case("CAP_") {
        &cap[4..]
    } else {
        cap
    }
}

fn capability_regex(
    builder: &'static str,
    alternatives: &str,
) -> Result<regex::Regex, PolicyError> {
    super::compile_regex(builder, &format!("(CAP_)?({})", alternatives), false)
}
