// builders/map.rs — Key/value checks over labels, annotations and env.
//
// Maps are flattened to `key=value` strings. Keys and values are anchored
// case-insensitive regexes; an absent value means "any value".

use super::{compile_regex, non_empty, Built};
use crate::error::PolicyError;
use crate::printer::{FieldTemplate, Printer};
use crate::query::{FieldQuery, Operation, Query};
use crate::registry::{FieldLabel, FieldRegistry};
use crate::spec::{KeyValuePolicy, PolicyFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapRequirement {
    /// Violation when no entry satisfies the key (and value).
    Required,
    /// Violation when some entry satisfies the key (and value).
    Disallowed,
}

#[derive(Debug, Clone)]
pub struct MapBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    pub requirement: MapRequirement,
    /// What the entries are, e.g. "label" or "Container Environment".
    pub subject: &'static str,
    /// Policy wording used in disallowed messages.
    pub policy_label: &'static str,
    pub source: fn(&PolicyFields) -> Option<KeyValuePolicy>,
}

impl MapBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(policy) = (self.source)(fields) else {
            return Ok(None);
        };
        let key = non_empty(policy.key.as_ref());
        let value = non_empty(policy.value.as_ref());
        let key = match (key, value) {
            (None, None) => return Ok(None),
            (None, Some(_)) => return Err(PolicyError::ValueWithoutKey { builder: self.name }),
            (Some(key), _) => key,
        };
        let metadata = registry.require(self.name, self.label)?;
        let key_re = compile_regex(self.name, key, false)?;
        let value_re = value
            .map(|v| compile_regex(self.name, v, false))
            .transpose()?;
        let shown_value = value.unwrap_or(".*");

        let built = match self.requirement {
            MapRequirement::Required => {
                // Key present with a wrong value, or key absent altogether.
                let wrong_value = value_re.map(|re| {
                    Query::Match(FieldQuery::new(
                        self.label,
                        metadata,
                        Operation::MapEntry {
                            key: key_re.clone(),
                            value: Some(re),
                            negate_value: true,
                        },
                    ))
                });
                let absent = Query::Match(FieldQuery::new(
                    self.label,
                    metadata,
                    Operation::MapKeyAbsent(key_re),
                ));
                Query::any([wrong_value, Some(absent)]).map(|query| Built {
                    query,
                    printer: Printer::fixed(format!(
                        "Required {} not found (key = '{}', value = '{}')",
                        self.subject, key, shown_value
                    )),
                })
            }
            MapRequirement::Disallowed => Some(Built {
                query: Query::Match(FieldQuery::new(
                    self.label,
                    metadata,
                    Operation::MapEntry {
                        key: key_re,
                        value: value_re,
                        negate_value: false,
                    },
                )),
                printer: Printer::field(
                    &metadata.path,
                    FieldTemplate::MapEntry {
                        subject: self.subject.to_string(),
                        policy: self.policy_label.to_string(),
                        key: key.to_string(),
                        value: shown_value.to_string(),
                    },
                ),
            }),
        };
        Ok(built)
    }
}
