// engine.rs — Predicate execution against in-memory entities.
//
// The matcher treats predicate execution as a collaborator behind the
// `PredicateEngine` trait: given a compiled query and an entity it returns
// the highlights of a match, or `None`. `FieldEvaluator` is the built-in
// engine. It flattens the entity (see search.rs) and walks the tree:
//
// 1. Match leaf → test every value at the path, highlight the ones that hit
//    under the leaf's highlight key
// 2. Linked leaf group → test row by row, highlight whole matching rows
// 3. Conjunction → every child must match; highlights are merged
// 4. Disjunction → at least one child must match; matching children merge
//
// Missing and MapKeyAbsent test the whole value list rather than
// individual values. Lacks tests per-container rows, each a
// separator-joined list (see search.rs). Empty strings are unset values
// and never satisfy a regex.

use chrono::{DateTime, Duration, Utc};

use crate::query::{FieldQuery, MatchResult, Operation, Query};
use crate::search::{FieldValues, Searchable, LIST_SEPARATOR};

/// Executes compiled predicates against entities.
///
/// Implementations must be stateless with respect to evaluation so one
/// engine can serve any number of concurrent matchers.
pub trait PredicateEngine: Send + Sync {
    /// Evaluate `query` against `entity`, returning highlights on a match.
    fn evaluate(&self, query: &Query, entity: &dyn Searchable) -> Option<MatchResult>;
}

/// The default engine: direct evaluation over flattened field values.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldEvaluator;

impl FieldEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate against an already-flattened entity.
    pub fn evaluate_values(&self, query: &Query, values: &FieldValues) -> Option<MatchResult> {
        match query {
            Query::Match(field) => evaluate_leaf(field, values.get(&field.path)),
            Query::Linked(fields) => evaluate_linked(fields, values),
            Query::Conjunction(children) => {
                let mut merged = MatchResult::new();
                for child in children {
                    merged.merge(self.evaluate_values(child, values)?);
                }
                Some(merged)
            }
            Query::Disjunction(children) => {
                let mut merged: Option<MatchResult> = None;
                for child in children {
                    if let Some(result) = self.evaluate_values(child, values) {
                        merged.get_or_insert_with(MatchResult::new).merge(result);
                    }
                }
                merged
            }
        }
    }
}

impl PredicateEngine for FieldEvaluator {
    fn evaluate(&self, query: &Query, entity: &dyn Searchable) -> Option<MatchResult> {
        self.evaluate_values(query, &entity.field_values())
    }
}

fn evaluate_leaf(field: &FieldQuery, values: &[String]) -> Option<MatchResult> {
    let mut result = MatchResult::new();
    match &field.op {
        Operation::Missing => {
            if values.is_empty() {
                Some(result)
            } else {
                None
            }
        }
        Operation::Lacks { pattern, display } => {
            if !values.iter().any(|row| lacks(pattern, row)) {
                return None;
            }
            result.add(&field.key, display.as_str());
            Some(result)
        }
        Operation::MapKeyAbsent(key) => {
            if values.iter().any(|v| key.is_match(split_entry(v).0)) {
                None
            } else {
                Some(result)
            }
        }
        op => {
            for value in values {
                if value_matches(op, value) {
                    result.add(&field.key, value.as_str());
                }
            }
            if result.get(&field.key).is_empty() {
                None
            } else {
                Some(result)
            }
        }
    }
}

/// Rows are formed by index across the member paths. A path shorter than
/// the longest one reads as empty strings past its end.
fn evaluate_linked(fields: &[FieldQuery], values: &FieldValues) -> Option<MatchResult> {
    let columns: Vec<&[String]> = fields.iter().map(|f| values.get(&f.path)).collect();
    let rows = columns.iter().map(|c| c.len()).max().unwrap_or(0);

    let mut result = MatchResult::new();
    let mut matched = false;
    for i in 0..rows {
        let row: Vec<&str> = columns
            .iter()
            .map(|c| c.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        let hit = fields
            .iter()
            .zip(&row)
            .all(|(field, value)| value_matches(&field.op, value));
        if hit {
            matched = true;
            for (field, value) in fields.iter().zip(&row) {
                result.add(&field.key, *value);
            }
        }
    }
    matched.then_some(result)
}

fn value_matches(op: &Operation, value: &str) -> bool {
    match op {
        Operation::Regex(re) => !value.is_empty() && re.is_match(value),
        Operation::Exact(expected) => value == expected,
        Operation::Numeric {
            comparator,
            threshold,
        } => value
            .parse::<f64>()
            .map(|v| comparator.compare(v, *threshold))
            .unwrap_or(false),
        Operation::OlderThanDays(days) => DateTime::parse_from_rfc3339(value)
            .map(|ts| Utc::now() - ts.with_timezone(&Utc) > Duration::days(*days))
            .unwrap_or(false),
        Operation::Missing => value.is_empty(),
        Operation::Lacks { pattern, .. } => lacks(pattern, value),
        Operation::MapEntry {
            key,
            value: value_re,
            negate_value,
        } => {
            let (k, v) = split_entry(value);
            if !key.is_match(k) {
                return false;
            }
            match value_re {
                Some(re) => re.is_match(v) != *negate_value,
                None => true,
            }
        }
        Operation::MapKeyAbsent(key) => !key.is_match(split_entry(value).0),
        Operation::Any => true,
        Operation::Never => false,
    }
}

/// No item of the separator-joined `row` matches `pattern`.
fn lacks(pattern: &regex::Regex, row: &str) -> bool {
    !row
        .split(LIST_SEPARATOR)
        .any(|item| pattern.is_match(item.trim()))
}

/// Split a flattened `key=value` map entry.
pub(crate) fn split_entry(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, ""))
}
