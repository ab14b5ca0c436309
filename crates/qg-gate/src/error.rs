// error.rs — Error types for the enforcement layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the enforcer. Policy checks themselves never fail;
/// these come from quorum operations and from setup.
#[derive(Debug, Error)]
pub enum GateError {
    /// Rule resolution failed (e.g., the rule vanished since the check).
    #[error(transparent)]
    Policy(#[from] qg_policy::PolicyError),

    /// A quorum request named a decision other than the one for the
    /// requesting actor's action.
    #[error("policy id '{policy_id}' does not match the requested action '{expected}'")]
    PolicyIdMismatch { policy_id: String, expected: String },

    /// The rule allows or denies outright, so there is nothing to vote on.
    #[error("'{policy_id}' does not require a quorum")]
    QuorumNotRequired { policy_id: String },

    /// The quorum engine refused or failed to record the change.
    #[error(transparent)]
    Quorum(#[from] qg_quorum::QuorumError),

    /// The audit log could not be opened.
    #[error(transparent)]
    Audit(#[from] qg_audit::AuditError),

    /// The gate configuration file is unreadable or invalid.
    #[error("invalid gate config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}
