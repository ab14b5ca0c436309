// check.rs — Policy check results and the verdict handed to transports.

use qg_policy::{policy_id, ActorContext, Capability, PolicyRule, PolicyTable, QuorumKind, Scope};
use qg_quorum::{DecisionResult, QuorumDecision};
use serde::{Deserialize, Serialize};

/// Denial reason when no rule matches.
pub const REASON_NO_RULE: &str = "No policy rule found for this action";

/// Denial reason when the actor fails a rule condition.
pub const REASON_CONDITIONS_NOT_MET: &str = "Policy conditions not met";

/// Outcome of a policy check.
///
/// `allowed` is true only when the rule needs no quorum and every condition
/// passes. A quorum requirement always defers to the quorum flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyCheckResult {
    pub allowed: bool,
    pub requires_quorum: bool,
    #[serde(default)]
    pub quorum_types: Vec<QuorumKind>,
    pub reversible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
}

/// What a transport should do with a check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Proceed.
    Allowed,
    /// Route to an approval workflow (202-style).
    PendingQuorum {
        policy_id: String,
        quorum_types: Vec<QuorumKind>,
    },
    /// Hard failure (403-style).
    Denied { reason: String },
}

impl PolicyCheckResult {
    fn denied(reason: &str, reversible: bool) -> Self {
        Self {
            allowed: false,
            requires_quorum: false,
            quorum_types: Vec::new(),
            reversible,
            reason: Some(reason.to_string()),
            policy_id: None,
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.allowed {
            return Verdict::Allowed;
        }
        match (&self.policy_id, self.requires_quorum) {
            (Some(policy_id), true) => Verdict::PendingQuorum {
                policy_id: policy_id.clone(),
                quorum_types: self.quorum_types.clone(),
            },
            _ => Verdict::Denied {
                reason: self
                    .reason
                    .clone()
                    .unwrap_or_else(|| REASON_NO_RULE.to_string()),
            },
        }
    }
}

/// All of the rule's conditions hold for the actor. A rule without
/// conditions always passes.
pub fn evaluate_conditions(rule: &PolicyRule, actor: &ActorContext) -> bool {
    let Some(conditions) = &rule.conditions else {
        return true;
    };
    match conditions.first_unmet(actor) {
        Some(condition) => {
            tracing::debug!(actor = %actor.actor_id, condition = condition.key(), "condition not met");
            false
        }
        None => true,
    }
}

/// Check a request against a specific table.
pub fn check_against(
    table: &PolicyTable,
    actor: &ActorContext,
    capability: Capability,
    scope: Scope,
) -> PolicyCheckResult {
    let Some(rule) = table.find_matching_rule(actor.actor_type, capability, scope) else {
        return PolicyCheckResult::denied(REASON_NO_RULE, false);
    };

    if !evaluate_conditions(rule, actor) {
        return PolicyCheckResult::denied(REASON_CONDITIONS_NOT_MET, rule.is_reversible());
    }

    let needs_quorum = rule.requires_quorum();
    PolicyCheckResult {
        allowed: !needs_quorum,
        requires_quorum: needs_quorum,
        quorum_types: rule.review_quorum.clone(),
        reversible: rule.is_reversible(),
        reason: None,
        policy_id: Some(policy_id(actor.actor_type, capability, scope)),
    }
}

/// Where a quorum request stands after it was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumStatus {
    pub policy_id: String,
    pub status: DecisionResult,
    pub approvals: usize,
    pub threshold: usize,
}

impl From<&QuorumDecision> for QuorumStatus {
    fn from(decision: &QuorumDecision) -> Self {
        Self {
            policy_id: decision.policy_id.clone(),
            status: decision.result,
            approvals: decision.approvals(),
            threshold: decision.threshold,
        }
    }
}
