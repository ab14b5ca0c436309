// event.rs — Audit event data model.
//
// One event per governance-relevant step. Events carry the policy id they
// concern (when there is one) and a free-form metadata payload holding the
// step's details (decision, reason, resulting status).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of step an event records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// `check_policy` produced a verdict.
    PolicyCheck,
    /// An actor asked for quorum approval of a gated action.
    QuorumRequested,
    /// A voter cast (or replaced) a vote.
    VoteCast,
    /// Specialized quorum evidence (tests, stake, guards) was evaluated.
    EvidenceSubmitted,
    /// A decision was removed to allow a fresh round.
    DecisionCleared,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::PolicyCheck => "policy_check",
            AuditAction::QuorumRequested => "quorum_requested",
            AuditAction::VoteCast => "vote_cast",
            AuditAction::EvidenceSubmitted => "evidence_submitted",
            AuditAction::DecisionCleared => "decision_cleared",
        };
        write!(f, "{}", s)
    }
}

/// A single audit event, one line in the JSONL log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this event.
    pub event_id: Uuid,

    /// When the step happened (UTC).
    pub timestamp: DateTime<Utc>,

    /// The actor or voter that triggered the step.
    pub actor_id: String,

    /// What happened.
    pub action: AuditAction,

    /// The quorum decision key this event concerns, if any.
    pub policy_id: Option<String>,

    /// Hash of the previous line in the log. `None` for the first event.
    pub previous_hash: Option<String>,

    /// Step-specific details.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    /// Create an event stamped with the current time and a fresh id.
    pub fn new(actor_id: impl Into<String>, action: AuditAction) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor_id: actor_id.into(),
            action,
            policy_id: None,
            previous_hash: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach the policy id and return self (builder pattern).
    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    /// Attach metadata and return self.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
