// matcher.rs — A compiled policy, ready to run against entities.
//
// The matcher holds one predicate per entity kind. Every present predicate
// must be satisfied by the corresponding entity:
//
// 1. process predicate → the supplied process event must match
// 2. deployment predicate → the supplied deployment must match
// 3. image predicate → at least one image must match; every matching
//    image's highlights are kept
//
// The merged highlights go to the printer. A match that renders nothing is
// a bug in a builder or printer and is reported as an error rather than
// silently dropped.

use std::fmt;
use std::sync::Arc;

use kd_model::{Deployment, Image, ProcessIndicator};

use crate::engine::PredicateEngine;
use crate::error::PolicyError;
use crate::printer::Printer;
use crate::query::{MatchResult, Query};
use crate::violation::{ProcessViolation, Violations};

/// Immutable and `Send + Sync`; share one behind an `Arc`.
pub struct Matcher {
    policy_name: String,
    deployment: Option<Query>,
    image: Option<Query>,
    process: Option<Query>,
    printer: Printer,
    engine: Arc<dyn PredicateEngine>,
}

impl Matcher {
    pub(crate) fn new(
        policy_name: String,
        deployment: Option<Query>,
        image: Option<Query>,
        process: Option<Query>,
        printer: Printer,
        engine: Arc<dyn PredicateEngine>,
    ) -> Self {
        Self {
            policy_name,
            deployment,
            image,
            process,
            printer,
            engine,
        }
    }

    /// Swap the predicate engine, e.g. for a test double.
    pub fn with_engine(mut self, engine: Arc<dyn PredicateEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    pub fn deployment_query(&self) -> Option<&Query> {
        self.deployment.as_ref()
    }

    pub fn image_query(&self) -> Option<&Query> {
        self.image.as_ref()
    }

    pub fn process_query(&self) -> Option<&Query> {
        self.process.as_ref()
    }

    pub fn printer(&self) -> &Printer {
        &self.printer
    }

    /// Run the policy against one deployment, its images and an optional
    /// process event. An empty `Violations` means no match.
    pub fn match_one(
        &self,
        deployment: Option<&Deployment>,
        images: &[Image],
        process: Option<&ProcessIndicator>,
    ) -> Result<Violations, PolicyError> {
        if self.deployment.is_none() && self.image.is_none() && self.process.is_none() {
            return Ok(Violations::none());
        }

        let mut merged = MatchResult::new();

        if let Some(query) = &self.process {
            let Some(result) = process.and_then(|p| self.engine.evaluate(query, p)) else {
                return Ok(Violations::none());
            };
            merged.merge(result);
        }

        if let Some(query) = &self.deployment {
            let Some(result) = deployment.and_then(|d| self.engine.evaluate(query, d)) else {
                return Ok(Violations::none());
            };
            merged.merge(result);
        }

        if let Some(query) = &self.image {
            let mut matched = false;
            for image in images {
                if let Some(result) = self.engine.evaluate(query, image) {
                    matched = true;
                    merged.merge(result);
                }
            }
            if !matched {
                return Ok(Violations::none());
            }
        }

        let violations = Violations {
            alert_violations: self.printer.render(&merged),
            process_violation: process.map(ProcessViolation::for_process),
        };
        if violations.is_empty() {
            tracing::error!(policy = %self.policy_name, "match produced no violation messages");
            return Err(PolicyError::SilentMatch {
                policy: self.policy_name.clone(),
            });
        }
        tracing::debug!(
            policy = %self.policy_name,
            alerts = violations.alert_violations.len(),
            "policy matched"
        );
        Ok(violations)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("policy_name", &self.policy_name)
            .field("deployment", &self.deployment)
            .field("image", &self.image)
            .field("process", &self.process)
            .field("printer", &self.printer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FieldEvaluator;
    use crate::printer::FieldTemplate;
    use crate::query::{FieldQuery, Operation};
    use crate::registry::{FieldLabel, FieldRegistry};
    use crate::search::Searchable;
    use kd_model::{Container, ContainerImage, ImageName, ProcessSignal, SecurityContext};

    fn exact(label: FieldLabel, value: &str) -> Query {
        let registry = FieldRegistry::standard();
        Query::Match(FieldQuery::new(
            label,
            registry.lookup(label).unwrap(),
            Operation::Exact(value.to_string()),
        ))
    }

    fn image(tag: &str) -> Image {
        Image {
            id: format!("sha256:{}", tag),
            name: ImageName {
                registry: "docker.io".to_string(),
                remote: "library/nginx".to_string(),
                tag: tag.to_string(),
                full_name: format!("docker.io/library/nginx:{}", tag),
            },
            ..Default::default()
        }
    }

    fn privileged_deployment() -> Deployment {
        Deployment {
            id: "d1".to_string(),
            name: "web".to_string(),
            namespace: "default".to_string(),
            containers: vec![Container {
                name: "nginx".to_string(),
                image: ContainerImage {
                    id: "sha256:latest".to_string(),
                    name: image("latest").name,
                },
                security_context: SecurityContext {
                    privileged: true,
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn tag_printer() -> Printer {
        Printer::field(
            "image.name.tag",
            FieldTemplate::Matched {
                label: "Image tag".to_string(),
                pattern: "latest".to_string(),
            },
        )
    }

    fn matcher(
        deployment: Option<Query>,
        image: Option<Query>,
        process: Option<Query>,
        printer: Printer,
    ) -> Matcher {
        Matcher::new(
            "test".to_string(),
            deployment,
            image,
            process,
            printer,
            Arc::new(FieldEvaluator),
        )
    }

    #[test]
    fn image_predicate_needs_one_matching_image() {
        let m = matcher(None, Some(exact(FieldLabel::ImageTag, "latest")), None, tag_printer());
        let none = m.match_one(None, &[image("1.25")], None).unwrap();
        assert!(none.is_empty());

        let some = m
            .match_one(None, &[image("1.25"), image("latest")], None)
            .unwrap();
        assert_eq!(some.alert_violations.len(), 1);
        assert_eq!(some.alert_violations[0].message, "Image tag 'latest' matched latest");
    }

    #[test]
    fn every_matching_image_is_reported() {
        let m = matcher(None, Some(exact(FieldLabel::ImageTag, "latest")), None, tag_printer());
        let v = m
            .match_one(None, &[image("latest"), image("latest")], None)
            .unwrap();
        assert_eq!(v.alert_violations.len(), 2);
    }

    #[test]
    fn deployment_predicate_without_deployment_is_no_match() {
        let m = matcher(
            Some(exact(FieldLabel::Privileged, "true")),
            None,
            None,
            Printer::fixed("Privileged container found"),
        );
        assert!(m.match_one(None, &[], None).unwrap().is_empty());
        let v = m.match_one(Some(&privileged_deployment()), &[], None).unwrap();
        assert_eq!(v.alert_violations[0].message, "Privileged container found");
    }

    #[test]
    fn all_kinds_must_match() {
        let m = matcher(
            Some(exact(FieldLabel::Privileged, "true")),
            Some(exact(FieldLabel::ImageTag, "latest")),
            None,
            tag_printer(),
        );
        let deployment = privileged_deployment();
        assert!(m.match_one(Some(&deployment), &[image("1.0")], None).unwrap().is_empty());
        assert!(!m.match_one(Some(&deployment), &[image("latest")], None).unwrap().is_empty());
    }

    #[test]
    fn process_match_synthesises_process_violation() {
        let m = matcher(
            None,
            None,
            Some(exact(FieldLabel::ProcessName, "nc")),
            Printer::fixed("Found process with name matching 'nc'"),
        );
        let process = ProcessIndicator {
            id: "p1".to_string(),
            deployment_id: "d1".to_string(),
            signal: ProcessSignal {
                name: "nc".to_string(),
                args: "-l 4444".to_string(),
                exec_file_path: "/usr/bin/nc".to_string(),
                uid: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(m.match_one(None, &[], None).unwrap().is_empty());
        let v = m.match_one(None, &[], Some(&process)).unwrap();
        let pv = v.process_violation.unwrap();
        assert_eq!(
            pv.message,
            "Binary '/usr/bin/nc' executed with arguments '-l 4444' under user ID 0"
        );
        assert_eq!(pv.processes, vec![process]);
    }

    /// Matches everything and highlights nothing.
    struct SilentEngine;

    impl PredicateEngine for SilentEngine {
        fn evaluate(&self, _query: &Query, _entity: &dyn Searchable) -> Option<MatchResult> {
            Some(MatchResult::new())
        }
    }

    #[test]
    fn match_without_messages_is_an_error() {
        let m = matcher(None, Some(exact(FieldLabel::ImageTag, "latest")), None, tag_printer())
            .with_engine(Arc::new(SilentEngine));
        let err = m.match_one(None, &[image("1.0")], None).unwrap_err();
        assert!(matches!(err, PolicyError::SilentMatch { ref policy } if policy == "test"));
    }

    #[test]
    fn matcher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Matcher>();
    }
}
