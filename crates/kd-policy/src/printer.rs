// printer.rs — Violation printers as inspectable value objects.
//
// A printer binds one or more highlight keys to a message template. Given
// the merged match result it reads the highlights under its keys and renders
// zero or more alert violations, without looking at the original entity.
// Printers are plain data (Serialize + PartialEq) so tests can assert on the
// printer a builder produced, not just on its output.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::query::{highlight_key, MatchResult};
use crate::spec::Comparator;
use crate::violation::AlertViolation;

/// Renders violation messages from match highlights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Printer {
    /// One message per value highlighted under `key`.
    Field { key: String, template: FieldTemplate },
    /// One row per index across the highlights of `keys`.
    Linked {
        keys: Vec<String>,
        template: LinkedTemplate,
    },
    /// A message that does not depend on highlights.
    Fixed { message: String },
    /// Child printers rendered in order.
    Concat { printers: Vec<Printer> },
}

impl Printer {
    pub fn field(key: &str, template: FieldTemplate) -> Self {
        Printer::Field {
            key: key.to_string(),
            template,
        }
    }

    pub fn fixed(message: impl Into<String>) -> Self {
        Printer::Fixed {
            message: message.into(),
        }
    }

    /// Concatenate the present printers. A single one is returned as-is.
    pub fn concat(printers: impl IntoIterator<Item = Option<Printer>>) -> Option<Printer> {
        let mut present: Vec<Printer> = printers.into_iter().flatten().collect();
        match present.len() {
            0 => None,
            1 => present.pop(),
            _ => Some(Printer::Concat { printers: present }),
        }
    }

    /// Read highlights from the keys `builder` records under. The keys
    /// must be attribute paths, as printed by a builder.
    pub fn key_highlights(&mut self, builder: &str) {
        match self {
            Printer::Field { key, .. } => *key = highlight_key(builder, key),
            Printer::Linked { keys, .. } => {
                for key in keys.iter_mut() {
                    *key = highlight_key(builder, key);
                }
            }
            Printer::Fixed { .. } => {}
            Printer::Concat { printers } => {
                for printer in printers.iter_mut() {
                    printer.key_highlights(builder);
                }
            }
        }
    }

    pub fn render(&self, result: &MatchResult) -> Vec<AlertViolation> {
        match self {
            Printer::Field { key, template } => template.render(result.get(key)),
            Printer::Linked { keys, template } => render_linked(keys, template, result),
            Printer::Fixed { message } => vec![AlertViolation::new(message.as_str())],
            Printer::Concat { printers } => {
                printers.iter().flat_map(|p| p.render(result)).collect()
            }
        }
    }
}

/// Message shapes for single-path printers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum FieldTemplate {
    /// `{label} '{value}' matched {pattern}`
    Matched { label: String, pattern: String },
    /// `The {description} of {value} is {comparator} the threshold of {threshold}`
    Threshold {
        description: String,
        comparator: Comparator,
        threshold: f64,
    },
    /// `{label} '{time}' was more than {days} days ago`
    Age { label: String, days: i64 },
    /// Fixed message, emitted once when anything is highlighted.
    Flag { message: String },
    /// `{cap} was (not) in the {list} list`
    Capability { list: String, present: bool },
    /// `{subject} (key='k', value='v') matched {policy} (key = 'kp', value = 'vp')`
    MapEntry {
        subject: String,
        policy: String,
        key: String,
        value: String,
    },
    /// `Found process(es) with {attribute} matching '{pattern}'`, once.
    Process { attribute: String, pattern: String },
}

impl FieldTemplate {
    fn render(&self, values: &[String]) -> Vec<AlertViolation> {
        match self {
            FieldTemplate::Flag { message } => once(values, message.clone()),
            FieldTemplate::Process { attribute, pattern } => {
                once(values, process_message(attribute, pattern))
            }
            _ => values
                .iter()
                .map(|v| AlertViolation::new(self.render_value(v)))
                .collect(),
        }
    }

    fn render_value(&self, value: &str) -> String {
        match self {
            FieldTemplate::Matched { label, pattern } => {
                format!("{} '{}' matched {}", label, value, pattern)
            }
            FieldTemplate::Threshold {
                description,
                comparator,
                threshold,
            } => format!(
                "The {} of {} is {} the threshold of {:.2}",
                description,
                value,
                comparator.words(),
                threshold
            ),
            FieldTemplate::Age { label, days } => format!(
                "{} '{}' was more than {} days ago",
                label,
                readable_time(value),
                days
            ),
            FieldTemplate::Capability { list, present } => {
                let verb = if *present { "was" } else { "was not" };
                format!("{} {} in the {} list", value, verb, list)
            }
            FieldTemplate::MapEntry {
                subject,
                policy,
                key,
                value: value_pattern,
            } => {
                let (k, v) = crate::engine::split_entry(value);
                format!(
                    "{} (key='{}', value='{}') matched {} (key = '{}', value = '{}')",
                    subject, k, v, policy, key, value_pattern
                )
            }
            FieldTemplate::Flag { message } => message.clone(),
            FieldTemplate::Process { attribute, pattern } => process_message(attribute, pattern),
        }
    }
}

fn process_message(attribute: &str, pattern: &str) -> String {
    let subject = if attribute == "args" { "processes" } else { "process" };
    format!("Found {} with {} matching '{}'", subject, attribute, pattern)
}

fn once(values: &[String], message: String) -> Vec<AlertViolation> {
    if values.is_empty() {
        Vec::new()
    } else {
        vec![AlertViolation::new(message)]
    }
}

/// Render an RFC 3339 timestamp as `YYYY-MM-DD HH:MM:SS`; other input is
/// shown unchanged.
pub fn readable_time(value: &str) -> String {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| value.to_string())
}

/// Message shapes for linked printers. Row values arrive in `keys` order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum LinkedTemplate {
    /// Rows: `[instruction, value]`.
    DockerfileLine { instruction: String, value: String },
    /// Rows: `[cve, link]`.
    Cve { pattern: String },
    /// Rows: `[cvss, cve]` or `[cvss, cve, fixed_by]`.
    Cvss {
        comparator: Comparator,
        threshold: f64,
    },
    /// Rows: `[fixed_by, cve]`.
    FixedBy { pattern: String },
    /// Rows: `[volume type, read_only, source]`.
    HostMount { read_only: bool },
    /// Rows: one value per column, in `columns` order. One message per
    /// column.
    Volume { columns: Vec<VolumeColumn> },
}

/// How one column of a volume row is reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "column", rename_all = "snake_case")]
pub enum VolumeColumn {
    /// `{label} '{value}' matched {pattern}`
    Matched { label: String, pattern: String },
    /// A fixed message.
    Flag { message: String },
}

impl LinkedTemplate {
    fn render_row(&self, row: &[&str]) -> Vec<AlertViolation> {
        let col = |i: usize| row.get(i).copied().unwrap_or("");
        let single = match self {
            LinkedTemplate::Volume { columns } => {
                return columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| match column {
                        VolumeColumn::Matched { label, pattern } => AlertViolation::new(
                            format!("{} '{}' matched {}", label, col(i), pattern),
                        ),
                        VolumeColumn::Flag { message } => AlertViolation::new(message.as_str()),
                    })
                    .collect();
            }
            LinkedTemplate::DockerfileLine { instruction, value } => AlertViolation::new(format!(
                "Dockerfile Line '{} {}' matches the rule {} {}",
                col(0),
                col(1),
                instruction,
                value
            )),
            LinkedTemplate::Cve { pattern } => {
                AlertViolation::new(format!("CVE {} matched regex '{}'", col(0), pattern))
                    .with_link(col(1))
            }
            LinkedTemplate::Cvss {
                comparator,
                threshold,
            } => {
                let mut message = format!(
                    "Found a CVSS score of {} ({} {:.1}) (cve: {})",
                    col(0),
                    comparator.words(),
                    threshold,
                    col(1)
                );
                if row.len() > 2 {
                    message.push_str(&format!(" (fixed by: {})", col(2)));
                }
                AlertViolation::new(message)
            }
            LinkedTemplate::FixedBy { pattern } => AlertViolation::new(format!(
                "Vulnerability {} is fixable in '{}' matching '{}'",
                col(1),
                col(0),
                pattern
            )),
            LinkedTemplate::HostMount { read_only } => {
                let kind = if *read_only { "Read-only" } else { "Writable" };
                AlertViolation::new(format!("{} host mount '{}' found", kind, col(2)))
            }
        };
        vec![single]
    }
}

/// Pair the n-th highlight of every key. Unequal counts mean the engine
/// broke the linked-field contract; log it and render nothing.
fn render_linked(
    keys: &[String],
    template: &LinkedTemplate,
    result: &MatchResult,
) -> Vec<AlertViolation> {
    let columns: Vec<&[String]> = keys.iter().map(|k| result.get(k)).collect();
    let rows = columns.first().map(|c| c.len()).unwrap_or(0);
    if columns.iter().any(|c| c.len() != rows) {
        tracing::warn!(
            "linked fields {:?} have mismatched highlight counts {:?}; skipping",
            keys,
            columns.iter().map(|c| c.len()).collect::<Vec<_>>()
        );
        return Vec::new();
    }
    (0..rows)
        .flat_map(|i| {
            let row: Vec<&str> = columns.iter().map(|c| c[i].as_str()).collect();
            template.render_row(&row)
        })
        .collect()
}
