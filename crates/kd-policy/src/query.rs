// query.rs — The compiled predicate tree and match results.
//
// Builders emit `Query` trees whose leaves test one attribute path of a
// flattened entity. Conjunction/Disjunction nodes combine subtrees; a
// `Linked` node requires its leaves to match at the same position of their
// value lists (e.g. the CVE and CVSS of the *same* vulnerability).
//
// Empty builders yield `None` rather than a vacuous node, and the
// `Query::all` / `Query::any` constructors drop `None` children so an empty
// combination is itself `None`.
//
// Every leaf records its matches under a highlight key. The key starts out
// as the attribute path; each builder then re-keys its own leaves and
// printer with its name, so two builders reading the same path keep
// separate highlight lists.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::registry::{EntityKind, FieldLabel, FieldMetadata};
use crate::spec::Comparator;

/// A boolean predicate over one entity.
#[derive(Debug, Clone)]
pub enum Query {
    Match(FieldQuery),
    Linked(Vec<FieldQuery>),
    Conjunction(Vec<Query>),
    Disjunction(Vec<Query>),
}

impl Query {
    /// Conjoin the present children. `None` if none are present; the child
    /// itself if only one is.
    pub fn all(children: impl IntoIterator<Item = Option<Query>>) -> Option<Query> {
        let mut present: Vec<Query> = children.into_iter().flatten().collect();
        match present.len() {
            0 => None,
            1 => present.pop(),
            _ => Some(Query::Conjunction(present)),
        }
    }

    /// Disjoin the present children, with the same collapsing rules as
    /// [`Query::all`].
    pub fn any(children: impl IntoIterator<Item = Option<Query>>) -> Option<Query> {
        let mut present: Vec<Query> = children.into_iter().flatten().collect();
        match present.len() {
            0 => None,
            1 => present.pop(),
            _ => Some(Query::Disjunction(present)),
        }
    }

    /// The entity kinds whose fields this tree reads.
    pub fn kinds(&self) -> BTreeSet<EntityKind> {
        let mut kinds = BTreeSet::new();
        self.collect_kinds(&mut kinds);
        kinds
    }

    /// Record this tree's highlights under keys owned by `builder`.
    pub fn key_highlights(&mut self, builder: &str) {
        match self {
            Query::Match(field) => field.key_highlights(builder),
            Query::Linked(fields) => {
                for field in fields {
                    field.key_highlights(builder);
                }
            }
            Query::Conjunction(children) | Query::Disjunction(children) => {
                for child in children {
                    child.key_highlights(builder);
                }
            }
        }
    }

    fn collect_kinds(&self, kinds: &mut BTreeSet<EntityKind>) {
        match self {
            Query::Match(field) => {
                kinds.insert(field.kind);
            }
            Query::Linked(fields) => kinds.extend(fields.iter().map(|f| f.kind)),
            Query::Conjunction(children) | Query::Disjunction(children) => {
                for child in children {
                    child.collect_kinds(kinds);
                }
            }
        }
    }
}

/// A leaf test of one attribute path.
#[derive(Debug, Clone)]
pub struct FieldQuery {
    pub label: FieldLabel,
    /// Attribute path the values are read from.
    pub path: String,
    /// Where matched values are recorded in the [`MatchResult`].
    pub key: String,
    pub kind: EntityKind,
    pub op: Operation,
}

impl FieldQuery {
    pub fn new(label: FieldLabel, metadata: &FieldMetadata, op: Operation) -> Self {
        Self {
            label,
            path: metadata.path.clone(),
            key: metadata.path.clone(),
            kind: metadata.kind,
            op,
        }
    }

    fn key_highlights(&mut self, builder: &str) {
        self.key = highlight_key(builder, &self.path);
    }
}

/// The highlight key `builder` records `path` under.
pub fn highlight_key(builder: &str, path: &str) -> String {
    format!("{}/{}", builder, path)
}

/// What a leaf checks against the values at its path.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Some value matches the expression.
    Regex(Regex),
    /// Some value equals the string exactly.
    Exact(String),
    /// Some value, parsed as a number, satisfies the comparison.
    Numeric {
        comparator: Comparator,
        threshold: f64,
    },
    /// Some RFC 3339 timestamp is more than `days` days old at evaluation
    /// time.
    OlderThanDays(i64),
    /// The path has no values at all.
    Missing,
    /// No value matches `pattern`. Highlights `display` when it holds.
    Lacks { pattern: Regex, display: String },
    /// Some `key=value` entry has a matching key and, when given, a value
    /// that matches (or, with `negate_value`, does not match).
    MapEntry {
        key: Regex,
        value: Option<Regex>,
        negate_value: bool,
    },
    /// No `key=value` entry has a matching key.
    MapKeyAbsent(Regex),
    /// Always matches; used to carry a linked field into the highlights.
    Any,
    /// Never matches. Stands for a constraint no entity satisfies.
    Never,
}

/// Highlights from one evaluation: highlight key → matched values in
/// document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchResult {
    highlights: BTreeMap<String, Vec<String>>,
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one matched value under `key`.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.highlights
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }

    /// Fold another result in, appending per key.
    pub fn merge(&mut self, other: MatchResult) {
        for (path, values) in other.highlights {
            self.highlights.entry(path).or_default().extend(values);
        }
    }

    /// Values matched under `key`; empty when nothing was recorded.
    pub fn get(&self, key: &str) -> &[String] {
        self.highlights
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.highlights.values().all(Vec::is_empty)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.highlights.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldRegistry;

    fn leaf(label: FieldLabel) -> Query {
        let registry = FieldRegistry::standard();
        let meta = registry.lookup(label).unwrap();
        Query::Match(FieldQuery::new(label, meta, Operation::Any))
    }

    #[test]
    fn all_of_nothing_is_none() {
        assert!(Query::all(vec![None, None]).is_none());
        assert!(Query::any(Vec::new()).is_none());
    }

    #[test]
    fn single_child_is_not_wrapped() {
        let q = Query::all(vec![None, Some(leaf(FieldLabel::Privileged))]).unwrap();
        assert!(matches!(q, Query::Match(_)));
    }

    #[test]
    fn multiple_children_build_a_node() {
        let q = Query::any(vec![
            Some(leaf(FieldLabel::Privileged)),
            None,
            Some(leaf(FieldLabel::ImageTag)),
        ])
        .unwrap();
        match &q {
            Query::Disjunction(children) => assert_eq!(children.len(), 2),
            other => panic!("expected disjunction, got {:?}", other),
        }
        let kinds = q.kinds();
        assert!(kinds.contains(&EntityKind::Deployment));
        assert!(kinds.contains(&EntityKind::Image));
    }

    #[test]
    fn keying_rewrites_every_leaf() {
        let mut q = Query::Conjunction(vec![
            leaf(FieldLabel::Privileged),
            Query::Linked(vec![match leaf(FieldLabel::Cve) {
                Query::Match(f) => f,
                _ => unreachable!(),
            }]),
        ]);
        q.key_highlights("cve");
        let Query::Conjunction(children) = &q else {
            panic!("expected conjunction");
        };
        match (&children[0], &children[1]) {
            (Query::Match(a), Query::Linked(b)) => {
                assert_eq!(a.key, "cve/deployment.containers.security_context.privileged");
                assert_eq!(a.path, "deployment.containers.security_context.privileged");
                assert_eq!(b[0].key, "cve/image.scan.components.vulns.cve");
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn merge_appends_per_path() {
        let mut a = MatchResult::new();
        a.add("image.name.tag", "latest");
        let mut b = MatchResult::new();
        b.add("image.name.tag", "1.10");
        b.add("image.name.registry", "docker.io");
        a.merge(b);
        assert_eq!(a.get("image.name.tag"), ["latest", "1.10"]);
        assert_eq!(a.get("image.name.registry"), ["docker.io"]);
        assert!(a.get("missing").is_empty());
        assert!(!a.is_empty());
    }
}
