// error.rs — Error types for quorum decisions.

use qg_policy::QuorumKind;
use thiserror::Error;

/// Errors that can occur while recording or reading quorum decisions.
#[derive(Debug, Error)]
pub enum QuorumError {
    /// Reading or writing a persisted decision failed.
    #[error("decision store I/O error at {path}: {source}")]
    Store {
        path: String,
        source: std::io::Error,
    },

    /// A persisted decision could not be (de)serialized.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The policy id cannot be used as a decision key.
    #[error("invalid policy id '{policy_id}': only letters, digits, '-' and '_' are allowed")]
    InvalidPolicyId { policy_id: String },

    /// Evidence was submitted for a quorum kind the rule does not require.
    #[error("quorum kind '{kind}' is not required for '{policy_id}'")]
    KindNotRequired { kind: QuorumKind, policy_id: String },

    /// A lock guarding decision state was poisoned by a panicking thread.
    #[error("decision lock poisoned: {0}")]
    LockPoisoned(String),
}
