// scope.rs — Scope entries → deployment predicate.
//
// A policy's scope list restricts where it applies. Each entry is a
// conjunction of whatever it sets (cluster, namespace, label); the list is
// the disjunction of its entries. The compiler conjoins the result ahead of
// the field predicate.

use crate::builders::compile_regex;
use crate::error::PolicyError;
use crate::query::{FieldQuery, Operation, Query};
use crate::registry::{FieldLabel, FieldRegistry};
use crate::spec::Scope;

const BUILDER: &str = "scope";

/// Translate `scopes` into one predicate, or `None` when nothing is scoped.
pub fn scope_query(
    scopes: &[Scope],
    registry: &FieldRegistry,
) -> Result<Option<Query>, PolicyError> {
    let mut entries = Vec::with_capacity(scopes.len());
    for scope in scopes {
        entries.push(entry_query(scope, registry)?);
    }
    Ok(Query::any(entries))
}

fn entry_query(scope: &Scope, registry: &FieldRegistry) -> Result<Option<Query>, PolicyError> {
    let mut parts = Vec::new();

    if let Some(cluster) = scope.cluster.as_deref().filter(|c| !c.is_empty()) {
        let metadata = registry.require(BUILDER, FieldLabel::ClusterId)?;
        parts.push(Some(Query::Match(FieldQuery::new(
            FieldLabel::ClusterId,
            metadata,
            Operation::Exact(cluster.to_string()),
        ))));
    }

    if let Some(namespace) = scope.namespace.as_deref().filter(|n| !n.is_empty()) {
        let metadata = registry.require(BUILDER, FieldLabel::Namespace)?;
        parts.push(Some(Query::Match(FieldQuery::new(
            FieldLabel::Namespace,
            metadata,
            Operation::Exact(namespace.to_string()),
        ))));
    }

    if let Some(label) = &scope.label {
        let key = label.key.as_deref().filter(|k| !k.is_empty());
        let value = label.value.as_deref().filter(|v| !v.is_empty());
        match (key, value) {
            (None, None) => {}
            (None, Some(_)) => return Err(PolicyError::ValueWithoutKey { builder: BUILDER }),
            (Some(key), value) => {
                let metadata = registry.require(BUILDER, FieldLabel::DeploymentLabel)?;
                // Scope labels are literal, not patterns.
                let key = compile_regex(BUILDER, &regex::escape(key), false)?;
                let value = value
                    .map(|v| compile_regex(BUILDER, &regex::escape(v), false))
                    .transpose()?;
                parts.push(Some(Query::Match(FieldQuery::new(
                    FieldLabel::DeploymentLabel,
                    metadata,
                    Operation::MapEntry {
                        key,
                        value,
                        negate_value: false,
                    },
                ))));
            }
        }
    }

    Ok(Query::all(parts))
}
