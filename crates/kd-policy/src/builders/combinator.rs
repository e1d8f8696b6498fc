// builders/combinator.rs — AND/OR over child builders.

use super::{Built, FieldBuilder};
use crate::error::PolicyError;
use crate::printer::Printer;
use crate::query::Query;
use crate::registry::FieldRegistry;
use crate::spec::PolicyFields;

/// Build every child, stopping at the first error. Absent children are
/// dropped; the printers of the rest are concatenated in order.
fn build_children(
    children: &[FieldBuilder],
    fields: &PolicyFields,
    registry: &FieldRegistry,
) -> Result<(Vec<Option<Query>>, Option<Printer>), PolicyError> {
    let mut queries = Vec::new();
    let mut printers = Vec::new();
    for child in children {
        if let Some(built) = child.build(fields, registry)? {
            tracing::trace!(builder = child.name(), "builder contributed a predicate");
            queries.push(Some(built.query));
            printers.push(Some(built.printer));
        }
    }
    Ok((queries, Printer::concat(printers)))
}

pub(crate) fn build_conjunction(
    children: &[FieldBuilder],
    fields: &PolicyFields,
    registry: &FieldRegistry,
) -> Result<Option<Built>, PolicyError> {
    let (queries, printer) = build_children(children, fields, registry)?;
    Ok(Query::all(queries)
        .zip(printer)
        .map(|(query, printer)| Built { query, printer }))
}

pub(crate) fn build_disjunction(
    children: &[FieldBuilder],
    fields: &PolicyFields,
    registry: &FieldRegistry,
) -> Result<Option<Built>, PolicyError> {
    let (queries, printer) = build_children(children, fields, registry)?;
    Ok(Query::any(queries)
        .zip(printer)
        .map(|(query, printer)| Built { query, printer }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{ExactBuilder, FlagBuilder, RegexBuilder};
    use crate::registry::FieldLabel;
    use crate::spec::{ImageNamePolicy, PortPolicy};

    fn tag() -> FieldBuilder {
        FieldBuilder::Regex(RegexBuilder {
            name: "image tag",
            label: FieldLabel::ImageTag,
            message_label: "Image tag",
            substring: false,
            source: |f| f.image_name.as_ref().and_then(|n| n.tag.clone()),
        })
    }

    fn privileged() -> FieldBuilder {
        FieldBuilder::Flag(FlagBuilder {
            name: "privileged",
            label: FieldLabel::Privileged,
            when_true: "Privileged container found",
            when_false: "Unprivileged container found",
            source: |f| f.privileged,
        })
    }

    fn port() -> FieldBuilder {
        FieldBuilder::Exact(ExactBuilder {
            name: "port",
            label: FieldLabel::Port,
            message_label: "Port",
            source: |f| f.port_policy.as_ref().and_then(|p| p.port).map(|p| p.to_string()),
        })
    }

    fn fields() -> PolicyFields {
        PolicyFields {
            image_name: Some(ImageNamePolicy {
                tag: Some("latest".to_string()),
                ..Default::default()
            }),
            privileged: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn conjunction_of_nothing_is_nothing() {
        let built = build_conjunction(
            &[tag(), port()],
            &PolicyFields::default(),
            &FieldRegistry::standard(),
        )
        .unwrap();
        assert!(built.is_none());
        assert!(build_conjunction(&[], &fields(), &FieldRegistry::standard())
            .unwrap()
            .is_none());
    }

    #[test]
    fn single_child_is_returned_unwrapped() {
        let only = build_conjunction(&[tag(), port()], &fields(), &FieldRegistry::standard())
            .unwrap()
            .unwrap();
        let direct = tag()
            .build(&fields(), &FieldRegistry::standard())
            .unwrap()
            .unwrap();
        assert!(matches!(only.query, Query::Match(_)));
        assert_eq!(only.printer, direct.printer);
    }

    #[test]
    fn present_children_become_one_node() {
        let both = build_conjunction(
            &[tag(), port(), privileged()],
            &fields(),
            &FieldRegistry::standard(),
        )
        .unwrap()
        .unwrap();
        match &both.query {
            Query::Conjunction(children) => assert_eq!(children.len(), 2),
            other => panic!("expected conjunction, got {:?}", other),
        }
        assert!(matches!(both.printer, Printer::Concat { ref printers } if printers.len() == 2));

        let either = build_disjunction(
            &[tag(), port(), privileged()],
            &fields(),
            &FieldRegistry::standard(),
        )
        .unwrap()
        .unwrap();
        assert!(matches!(either.query, Query::Disjunction(ref c) if c.len() == 2));
    }

    #[test]
    fn child_error_propagates() {
        let mut registry = FieldRegistry::standard();
        registry.remove(FieldLabel::Port);
        let fields = PolicyFields {
            port_policy: Some(PortPolicy {
                port: Some(22),
                protocol: None,
            }),
            ..fields()
        };
        let err = build_conjunction(&[tag(), port()], &fields, &registry).unwrap_err();
        assert!(matches!(err, PolicyError::UnknownField { builder: "port", .. }));
    }
}
