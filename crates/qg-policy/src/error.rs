// error.rs — Error types for rule tables and rule resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::actor::ActorType;
use crate::rule::{Capability, Scope};

/// Errors that can occur while loading, validating or resolving policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The rule table could not be read.
    #[error("failed to read policy table at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The YAML rule table does not match the schema.
    #[error("invalid YAML policy table: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON rule table does not match the schema.
    #[error("invalid JSON policy table: {0}")]
    Json(#[from] serde_json::Error),

    /// The table parsed but breaks a schema rule the types cannot express.
    #[error("invalid policy table: {reason}")]
    InvalidTable { reason: String },

    /// No rule matches the action. Raised only by operations that need the
    /// rule to exist (quorum requests and votes); checks deny instead.
    #[error("no policy rule for {actor_type} {capability} on {scope}")]
    RuleNotFound {
        actor_type: ActorType,
        capability: Capability,
        scope: Scope,
    },

    /// A policy id is not of the form `<actorType>-<capability>-<scope>`.
    #[error("invalid policy id '{policy_id}'")]
    InvalidPolicyId { policy_id: String },

    /// A string is not a member of one of the closed enumerations.
    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}
