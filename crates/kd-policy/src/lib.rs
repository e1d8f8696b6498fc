//! # kd-policy
//!
//! Policy compilation and matching for kube-detect.
//!
//! A [`Policy`] document names per-field constraints (image provenance,
//! CVE/CVSS thresholds, container configuration, resource limits, RBAC
//! exposure, process behaviour). The [`PolicyCompiler`] runs every field
//! builder over it, conjoins the scope, and produces a [`Matcher`] holding
//! one predicate per entity kind plus a [`Printer`] that turns match
//! highlights into [`Violations`].
//!
//! ## Key invariants
//!
//! - **Absent means neutral**: an unset sub-record contributes nothing. A
//!   policy where nothing contributes fails to compile.
//! - **All or nothing**: a bad regex, an unknown or unstored field, or a
//!   store failure aborts compilation; no partial matcher is returned.
//! - **Scope is a gate**: scope entries are conjoined ahead of the field
//!   predicate and never produce messages of their own.
//! - **No silent matches**: a match that renders no message is an error.
//! - **Snapshots, not caches**: RBAC data is pulled at every compile.

pub mod builders;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod printer;
pub mod query;
pub mod rbac;
pub mod registry;
pub mod scope;
pub mod search;
pub mod spec;
pub mod violation;

pub use builders::{BuilderRegistry, Built, FieldBuilder, RbacSources};
pub use compiler::{CompilerOptions, PolicyCompiler};
pub use engine::{FieldEvaluator, PredicateEngine};
pub use error::PolicyError;
pub use matcher::Matcher;
pub use printer::{FieldTemplate, LinkedTemplate, Printer};
pub use query::{FieldQuery, MatchResult, Operation, Query};
pub use rbac::ClusterPermissions;
pub use registry::{DataType, EntityKind, FieldLabel, FieldMetadata, FieldRegistry};
pub use scope::scope_query;
pub use search::{FieldValues, Searchable};
pub use spec::{Comparator, NumericalPolicy, Policy, PolicyFields, Scope, Severity};
pub use violation::{AlertViolation, ProcessViolation, Violations};
