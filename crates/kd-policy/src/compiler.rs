// compiler.rs — Policy Compiler.
//
// Compiles a Policy into a Matcher. The compiler:
// 1. Validates the policy has a name and at least one field sub-record
// 2. Runs the top-level conjunction over every builder (plus RBAC when
//    enabled). A permission threshold with RBAC enabled but no stores
//    attached is an error, never a silently dropped constraint.
// 3. Conjoins the scope predicate ahead of the field predicate
// 4. Splits the result by entity kind into deployment, image and process
//    predicates
//
// The key invariant: compilation either yields a complete matcher or an
// error. A store failure during RBAC evaluation, a bad regex, or a field
// the registry cannot serve aborts the whole compile.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builders::{BuilderRegistry, FieldBuilder, RbacBuilder, RbacSources};
use crate::engine::FieldEvaluator;
use crate::error::PolicyError;
use crate::matcher::Matcher;
use crate::query::Query;
use crate::registry::{EntityKind, FieldRegistry};
use crate::scope::scope_query;
use crate::spec::Policy;

/// Options for the Policy Compiler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerOptions {
    /// Run the RBAC builder when the policy sets a permission threshold
    /// (defaults to true). When enabled, a threshold needs attached stores.
    pub rbac_enabled: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { rbac_enabled: true }
    }
}

/// Turns policy documents into reusable matchers.
pub struct PolicyCompiler<'a> {
    registry: &'a FieldRegistry,
    builders: BuilderRegistry,
    options: CompilerOptions,
    rbac: Option<RbacSources>,
}

impl<'a> PolicyCompiler<'a> {
    /// A compiler over `registry` with the standard builder list.
    pub fn new(registry: &'a FieldRegistry, options: CompilerOptions) -> Self {
        Self {
            registry,
            builders: BuilderRegistry::standard(),
            options,
            rbac: None,
        }
    }

    /// Replace the builder list.
    pub fn with_builders(mut self, builders: BuilderRegistry) -> Self {
        self.builders = builders;
        self
    }

    /// Attach the stores the RBAC builder pulls its snapshot from.
    pub fn with_rbac(mut self, sources: RbacSources) -> Self {
        self.rbac = Some(sources);
        self
    }

    /// Compile `policy` into a matcher.
    pub fn compile(&self, policy: &Policy) -> Result<Matcher, PolicyError> {
        // Step 1: Validate the document.
        if policy.name.trim().is_empty() {
            return Err(PolicyError::MissingName);
        }
        let fields = match &policy.fields {
            Some(fields) if !fields.is_empty() => fields,
            _ => {
                return Err(PolicyError::EmptyFields {
                    policy: policy.name.clone(),
                })
            }
        };

        // Step 2: Top-level conjunction over every builder.
        let mut children = self.builders.builders().to_vec();
        if fields.permission_policy.is_some() {
            match (&self.rbac, self.options.rbac_enabled) {
                (Some(sources), true) => {
                    children.push(FieldBuilder::Rbac(RbacBuilder::new(sources.clone())));
                }
                (None, true) => {
                    return Err(PolicyError::RbacUnavailable {
                        policy: policy.name.clone(),
                    })
                }
                (_, false) => {
                    tracing::warn!(
                        policy = %policy.name,
                        "RBAC disabled; ignoring permission threshold"
                    );
                }
            }
        }
        let built = FieldBuilder::Conjunction(children)
            .build(fields, self.registry)?
            .ok_or_else(|| PolicyError::NoPredicate {
                policy: policy.name.clone(),
            })?;

        // Step 3: Scope gates the field predicate.
        let scope = scope_query(&policy.scope, self.registry)?;
        let has_scope = scope.is_some();
        let merged = Query::all([scope, Some(built.query)]).ok_or_else(|| {
            PolicyError::NoPredicate {
                policy: policy.name.clone(),
            }
        })?;

        // Step 4: One predicate per entity kind.
        let mut split = Split::default();
        split.insert(merged, &policy.name)?;

        tracing::debug!(
            policy = %policy.name,
            scoped = has_scope,
            deployment = split.deployment.len(),
            image = split.image.len(),
            process = split.process.len(),
            "compiled policy"
        );

        Ok(Matcher::new(
            policy.name.clone(),
            Query::all(split.deployment.into_iter().map(Some)),
            Query::all(split.image.into_iter().map(Some)),
            Query::all(split.process.into_iter().map(Some)),
            built.printer,
            Arc::new(FieldEvaluator),
        ))
    }
}

/// Top-level conjuncts grouped by the entity kind they read.
#[derive(Default)]
struct Split {
    deployment: Vec<Query>,
    image: Vec<Query>,
    process: Vec<Query>,
}

impl Split {
    /// Nested conjunctions are flattened; anything else must read a single
    /// entity kind.
    fn insert(&mut self, query: Query, policy: &str) -> Result<(), PolicyError> {
        if let Query::Conjunction(children) = query {
            for child in children {
                self.insert(child, policy)?;
            }
            return Ok(());
        }
        let kinds = query.kinds();
        let mut kinds = kinds.into_iter();
        match (kinds.next(), kinds.next()) {
            (Some(kind), None) => {
                match kind {
                    EntityKind::Deployment => self.deployment.push(query),
                    EntityKind::Image => self.image.push(query),
                    EntityKind::Process => self.process.push(query),
                }
                Ok(())
            }
            (None, _) => Ok(()),
            (Some(_), Some(_)) => Err(PolicyError::MixedEntityKinds {
                policy: policy.to_string(),
            }),
        }
    }
}
