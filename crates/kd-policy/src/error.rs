// error.rs — Error types for policy compilation and matching.
//
// Three families share one enum:
// - configuration errors (bad policy, unusable field) abort compilation;
// - collaborator errors (store failures) propagate unchanged;
// - internal-consistency errors (silent match) surface at match time.
// Builder-originated variants always carry the builder name so a broken
// policy can be diagnosed from the message alone.

use std::path::PathBuf;

use thiserror::Error;

use kd_model::StoreError;

use crate::registry::FieldLabel;

/// Errors that can occur while compiling or running a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy has no name.
    #[error("policy has no name")]
    MissingName,

    /// The policy sets no field sub-record at all.
    #[error("policy '{policy}' has no fields to check")]
    EmptyFields { policy: String },

    /// A builder needs a field the registry does not know.
    #[error("builder '{builder}': field '{field}' is not in the field registry")]
    UnknownField {
        builder: &'static str,
        field: FieldLabel,
    },

    /// A builder needs a field that is registered but not stored, so it
    /// cannot produce highlights for violation messages.
    #[error("builder '{builder}': field '{field}' is not stored and cannot be highlighted")]
    UnstoredField {
        builder: &'static str,
        field: FieldLabel,
    },

    /// A policy value failed to compile as a regular expression.
    #[error("builder '{builder}': invalid regex '{pattern}': {source}")]
    InvalidRegex {
        builder: &'static str,
        pattern: String,
        source: regex::Error,
    },

    /// A key/value policy names a value but no key.
    #[error("builder '{builder}': a value was given without a key")]
    ValueWithoutKey { builder: &'static str },

    /// No builder produced anything to check.
    #[error("policy '{policy}' compiled to an empty predicate")]
    NoPredicate { policy: String },

    /// A single predicate node mixes fields of different entity kinds.
    #[error("policy '{policy}': a predicate mixes deployment, image and process fields")]
    MixedEntityKinds { policy: String },

    /// The policy sets a permission threshold but the compiler has no
    /// RBAC stores to evaluate it against.
    #[error("policy '{policy}' sets a permission threshold but no RBAC stores are attached")]
    RbacUnavailable { policy: String },

    /// Fetching the RBAC snapshot failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A predicate matched but produced no explanation.
    #[error("policy '{policy}' matched but produced no violation messages")]
    SilentMatch { policy: String },

    /// The policy document could not be parsed.
    #[error("failed to parse policy document: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The policy document could not be read.
    #[error("failed to read policy at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
