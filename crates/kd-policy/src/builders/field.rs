// builders/field.rs — Single-field builders.
//
// Each builder reads one value out of PolicyFields through a plain function
// pointer, resolves one registry field, and emits a single Match leaf plus a
// Field printer bound to that field's path.

use super::{compile_regex, Built};
use crate::error::PolicyError;
use crate::printer::{FieldTemplate, Printer};
use crate::query::{FieldQuery, Operation, Query};
use crate::registry::{FieldLabel, FieldRegistry};
use crate::spec::{NumericalPolicy, PolicyFields};

/// Regular-expression match on a string field.
#[derive(Debug, Clone)]
pub struct RegexBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    /// Subject shown in messages, e.g. "Image tag".
    pub message_label: &'static str,
    /// Match anywhere in the value instead of the whole value.
    pub substring: bool,
    pub source: fn(&PolicyFields) -> Option<String>,
}

impl RegexBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(pattern) = (self.source)(fields).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let metadata = registry.require(self.name, self.label)?;
        let regex = compile_regex(self.name, &pattern, self.substring)?;
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(self.label, metadata, Operation::Regex(regex))),
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Matched {
                    label: self.message_label.to_string(),
                    pattern,
                },
            ),
        }))
    }
}

/// Exact string equality, e.g. a port number.
#[derive(Debug, Clone)]
pub struct ExactBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    pub message_label: &'static str,
    pub source: fn(&PolicyFields) -> Option<String>,
}

impl ExactBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(expected) = (self.source)(fields).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let metadata = registry.require(self.name, self.label)?;
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(
                self.label,
                metadata,
                Operation::Exact(expected.clone()),
            )),
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Matched {
                    label: self.message_label.to_string(),
                    pattern: expected,
                },
            ),
        }))
    }
}

/// Numeric comparison against a threshold.
#[derive(Debug, Clone)]
pub struct NumericBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    /// Noun phrase for messages, e.g. "CPU resource limit".
    pub description: &'static str,
    pub source: fn(&PolicyFields) -> Option<NumericalPolicy>,
}

impl NumericBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(policy) = (self.source)(fields) else {
            return Ok(None);
        };
        let metadata = registry.require(self.name, self.label)?;
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(
                self.label,
                metadata,
                Operation::Numeric {
                    comparator: policy.op,
                    threshold: policy.value,
                },
            )),
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Threshold {
                    description: self.description.to_string(),
                    comparator: policy.op,
                    threshold: policy.value,
                },
            ),
        }))
    }
}

/// "Timestamp older than N days".
#[derive(Debug, Clone)]
pub struct DaysBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    pub message_label: &'static str,
    pub source: fn(&PolicyFields) -> Option<i64>,
}

impl DaysBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(days) = (self.source)(fields) else {
            return Ok(None);
        };
        let metadata = registry.require(self.name, self.label)?;
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(
                self.label,
                metadata,
                Operation::OlderThanDays(days),
            )),
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Age {
                    label: self.message_label.to_string(),
                    days,
                },
            ),
        }))
    }
}

/// Boolean attribute equal to the requested value.
#[derive(Debug, Clone)]
pub struct FlagBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    pub when_true: &'static str,
    pub when_false: &'static str,
    pub source: fn(&PolicyFields) -> Option<bool>,
}

impl FlagBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(wanted) = (self.source)(fields) else {
            return Ok(None);
        };
        let metadata = registry.require(self.name, self.label)?;
        let message = if wanted { self.when_true } else { self.when_false };
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(
                self.label,
                metadata,
                Operation::Exact(wanted.to_string()),
            )),
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Flag {
                    message: message.to_string(),
                },
            ),
        }))
    }
}

/// The attribute is absent altogether. Only a `true` sub-record enables it.
#[derive(Debug, Clone)]
pub struct MissingBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    pub message: &'static str,
    pub source: fn(&PolicyFields) -> Option<bool>,
}

impl MissingBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        if (self.source)(fields) != Some(true) {
            return Ok(None);
        }
        let metadata = registry.require(self.name, self.label)?;
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(self.label, metadata, Operation::Missing)),
            printer: Printer::fixed(self.message),
        }))
    }
}

/// Process name/argument match. Patterns are unanchored.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    pub name: &'static str,
    pub label: FieldLabel,
    /// "name" or "args".
    pub attribute: &'static str,
    pub source: fn(&PolicyFields) -> Option<String>,
}

impl ProcessBuilder {
    pub fn build(
        &self,
        fields: &PolicyFields,
        registry: &FieldRegistry,
    ) -> Result<Option<Built>, PolicyError> {
        let Some(pattern) = (self.source)(fields).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let metadata = registry.require(self.name, self.label)?;
        let regex = compile_regex(self.name, &pattern, true)?;
        Ok(Some(Built {
            query: Query::Match(FieldQuery::new(self.label, metadata, Operation::Regex(regex))),
            printer: Printer::field(
                &metadata.path,
                FieldTemplate::Process {
                    attribute: self.attribute.to_string(),
                    pattern,
                },
            ),
        }))
    }
}
