// enforcer.rs — PolicyEnforcer: checks, quorum requests and votes.
//
// The enforcer resolves rules through a cached loader and hands quorum
// bookkeeping to the engine. Every operation that acts on a decision
// re-resolves its rule first, so the threshold and quorum kinds always come
// from the current table, and a rule that has disappeared is an error
// rather than a silent approval.

use std::sync::Arc;

use qg_audit::{AuditAction, AuditEvent, AuditLog};
use qg_policy::{
    parse_policy_id, policy_id as action_policy_id, ActorContext, ActorType, Capability, PolicyError, PolicyRule, PolicyTable,
    PolicyTableLoader, QuorumKind, Scope,
};
use qg_quorum::{JsonQuorumStore, QuorumDecision, QuorumEngine, QuorumEvidence, VoteDecision};

use crate::check::{self, PolicyCheckResult, QuorumStatus};
use crate::config::GateConfig;
use crate::error::GateError;

/// Authorizes actions and drives multi-party approval.
pub struct PolicyEnforcer {
    loader: PolicyTableLoader,
    quorum: QuorumEngine,
    requester_counts_toward_quorum: bool,
}

impl PolicyEnforcer {
    pub fn new(loader: PolicyTableLoader, quorum: QuorumEngine) -> Self {
        Self {
            loader,
            quorum,
            requester_counts_toward_quorum: true,
        }
    }

    /// Build an enforcer from config: table source and TTL, durable or
    /// in-memory decisions, and the optional audit log.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        let loader =
            PolicyTableLoader::new(config.policy_table.clone()).with_ttl(config.cache_ttl());

        let mut quorum = if config.persist_decisions {
            QuorumEngine::new(JsonQuorumStore::new(&config.decisions_dir)?)
        } else {
            QuorumEngine::in_memory()
        };
        if let Some(path) = &config.audit_log {
            quorum = quorum.with_audit(AuditLog::open(path)?);
        }

        Ok(Self::new(loader, quorum)
            .with_requester_vote(config.requester_counts_toward_quorum))
    }

    /// Whether a quorum request records the requester's own approval.
    pub fn with_requester_vote(mut self, counts: bool) -> Self {
        self.requester_counts_toward_quorum = counts;
        self
    }

    /// The effective rule table.
    pub fn table(&self) -> Arc<PolicyTable> {
        self.loader.load()
    }

    pub fn loader(&self) -> &PolicyTableLoader {
        &self.loader
    }

    pub fn quorum(&self) -> &QuorumEngine {
        &self.quorum
    }

    /// Decide whether `actor` may perform `capability` within `scope`.
    ///
    /// Never fails: a missing rule or an unmet condition is a denial with a
    /// reason, and a quorum requirement is reported rather than granted.
    pub fn check_policy(
        &self,
        actor: &ActorContext,
        capability: Capability,
        scope: Scope,
    ) -> PolicyCheckResult {
        let table = self.loader.load();
        let result = check::check_against(&table, actor, capability, scope);

        tracing::debug!(
            actor = %actor.actor_id,
            actor_type = %actor.actor_type,
            %capability,
            %scope,
            allowed = result.allowed,
            requires_quorum = result.requires_quorum,
            "policy checked"
        );

        let mut event = AuditEvent::new(&actor.actor_id, AuditAction::PolicyCheck).with_metadata(
            serde_json::json!({
                "actor_type": actor.actor_type,
                "capability": capability,
                "scope": scope,
                "table_version": table.version,
                "result": result,
            }),
        );
        if let Some(id) = &result.policy_id {
            event = event.with_policy_id(id);
        }
        self.quorum.record_audit(event);

        result
    }

    /// All of the rule's conditions hold for the actor.
    pub fn evaluate_conditions(&self, rule: &PolicyRule, actor: &ActorContext) -> bool {
        check::evaluate_conditions(rule, actor)
    }

    /// Open (or join) the approval round for an action that needs a quorum.
    ///
    /// `policy_id` must be the id of the actor's own action, and the rule is
    /// resolved again from the current table and must require a quorum. An
    /// empty `quorum_types` uses the rule's review quorum. A decision that
    /// is already approved or rejected is reported as-is.
    pub fn request_quorum_approval(
        &self,
        policy_id: &str,
        actor: &ActorContext,
        capability: Capability,
        scope: Scope,
        quorum_types: &[QuorumKind],
    ) -> Result<QuorumStatus, GateError> {
        let expected = action_policy_id(actor.actor_type, capability, scope);
        if policy_id != expected {
            tracing::warn!(policy_id, %expected, actor = %actor.actor_id, "quorum request for another action refused");
            return Err(GateError::PolicyIdMismatch {
                policy_id: policy_id.to_string(),
                expected,
            });
        }
        let rule = self.resolve(actor.actor_type, capability, scope)?;
        require_quorum(&rule, policy_id)?;
        let kinds = if quorum_types.is_empty() {
            rule.review_quorum.as_slice()
        } else {
            quorum_types
        };

        let decision = self.quorum.request(
            policy_id,
            actor,
            self.requester_counts_toward_quorum,
            kinds,
            rule.min_approvals(),
        )?;
        Ok(QuorumStatus::from(&decision))
    }

    /// Cast (or replace) a vote on the decision for `policy_id`.
    ///
    /// The policy id names the rule, which supplies the quorum kinds and
    /// threshold when the vote opens a new decision.
    pub fn cast_vote(
        &self,
        policy_id: &str,
        voter: &ActorContext,
        decision: VoteDecision,
        reason: Option<&str>,
    ) -> Result<QuorumDecision, GateError> {
        let rule = self.resolve_id(policy_id)?;
        require_quorum(&rule, policy_id)?;
        let updated = self.quorum.vote(
            policy_id,
            voter,
            decision,
            &rule.review_quorum,
            rule.min_approvals(),
            reason,
        )?;
        Ok(updated)
    }

    /// Evaluate evidence for one of the rule's quorum kinds and record the
    /// verdict on the decision.
    pub fn submit_evidence(
        &self,
        policy_id: &str,
        evidence: &QuorumEvidence,
    ) -> Result<QuorumDecision, GateError> {
        let rule = self.resolve_id(policy_id)?;
        let updated = self.quorum.submit_evidence(
            policy_id,
            evidence,
            &rule.review_quorum,
            rule.min_approvals(),
        )?;
        Ok(updated)
    }

    pub fn get_decision(&self, policy_id: &str) -> Result<Option<QuorumDecision>, GateError> {
        Ok(self.quorum.get_decision(policy_id)?)
    }

    /// True iff the action's decision exists and is approved.
    pub fn is_approved(&self, policy_id: &str) -> Result<bool, GateError> {
        Ok(self.quorum.is_approved(policy_id)?)
    }

    /// Drop the decision so the action can go through a fresh round.
    pub fn clear_decision(&self, policy_id: &str, cleared_by: &str) -> Result<bool, GateError> {
        Ok(self.quorum.clear_decision(policy_id, cleared_by)?)
    }

    /// Decisions still waiting for votes.
    pub fn pending(&self) -> Result<Vec<QuorumDecision>, GateError> {
        Ok(self.quorum.pending_decisions()?)
    }

    fn resolve(
        &self,
        actor_type: ActorType,
        capability: Capability,
        scope: Scope,
    ) -> Result<PolicyRule, GateError> {
        let table = self.loader.load();
        table
            .find_matching_rule(actor_type, capability, scope)
            .cloned()
            .ok_or_else(|| {
                GateError::Policy(PolicyError::RuleNotFound {
                    actor_type,
                    capability,
                    scope,
                })
            })
    }

    fn resolve_id(&self, policy_id: &str) -> Result<PolicyRule, GateError> {
        let (actor_type, capability, scope) = parse_policy_id(policy_id)?;
        self.resolve(actor_type, capability, scope)
    }
}

fn require_quorum(rule: &PolicyRule, policy_id: &str) -> Result<(), GateError> {
    if rule.requires_quorum() {
        Ok(())
    } else {
        Err(GateError::QuorumNotRequired {
            policy_id: policy_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_policy::{Condition, Conditions};
    use qg_quorum::DecisionResult;
    use tempfile::tempdir;

    fn enforcer(table: PolicyTable) -> PolicyEnforcer {
        PolicyEnforcer::new(PolicyTableLoader::fixed(table), QuorumEngine::in_memory())
    }

    fn payout_table(min: usize) -> PolicyTable {
        PolicyTable::new(
            "test-1",
            vec![PolicyRule::new(ActorType::Admin, Capability::Payout, Scope::Token, false)
                .with_quorum([QuorumKind::Creator, QuorumKind::Admin])
                .with_min_approvals(min)],
        )
    }

    fn admin(id: &str) -> ActorContext {
        ActorContext::new(id, ActorType::Admin)
    }

    #[test]
    fn fallback_table_gates_infrastructure() {
        let gate = PolicyEnforcer::new(PolicyTableLoader::new(None), QuorumEngine::in_memory());
        let result = gate.check_policy(&admin("root"), Capability::ManageKeys, Scope::Infrastructure);
        assert!(!result.allowed);
        assert!(result.requires_quorum);
        assert_eq!(result.quorum_types, vec![QuorumKind::Admin, QuorumKind::Safety]);

        let wallet = ActorContext::new("w", ActorType::Wallet);
        assert!(gate.check_policy(&wallet, Capability::Publish, Scope::Dream).allowed);
    }

    #[test]
    fn threshold_of_one_approves_on_request() {
        let gate = enforcer(payout_table(1));
        let status = gate
            .request_quorum_approval("admin-payout-token", &admin("root"), Capability::Payout, Scope::Token, &[])
            .unwrap();
        assert_eq!(status.status, DecisionResult::Approved);
        assert!(gate.is_approved("admin-payout-token").unwrap());
    }

    #[test]
    fn requester_vote_can_be_disabled() {
        let gate = enforcer(payout_table(1)).with_requester_vote(false);
        let status = gate
            .request_quorum_approval("admin-payout-token", &admin("root"), Capability::Payout, Scope::Token, &[])
            .unwrap();
        assert_eq!(status.status, DecisionResult::Pending);
        assert_eq!(status.approvals, 0);

        let d = gate
            .cast_vote("admin-payout-token", &admin("other"), VoteDecision::Approve, None)
            .unwrap();
        assert_eq!(d.result, DecisionResult::Approved);
        assert_eq!(d.requested_by.as_deref(), Some("root"));
    }

    #[test]
    fn request_for_vanished_rule_is_an_error() {
        let gate = enforcer(payout_table(2));
        let result = gate.request_quorum_approval(
            "admin-deploy-infrastructure",
            &admin("root"),
            Capability::Deploy,
            Scope::Infrastructure,
            &[QuorumKind::Tech],
        );
        assert!(matches!(
            result,
            Err(GateError::Policy(PolicyError::RuleNotFound { .. }))
        ));
        assert!(gate.get_decision("admin-deploy-infrastructure").unwrap().is_none());
    }

    #[test]
    fn request_cannot_target_another_actions_decision() {
        let gate = PolicyEnforcer::new(PolicyTableLoader::new(None), QuorumEngine::in_memory());
        let wallet = ActorContext::new("mallory", ActorType::Wallet);

        let result = gate.request_quorum_approval(
            "admin-payout-token",
            &wallet,
            Capability::Publish,
            Scope::Dream,
            &[],
        );
        match result {
            Err(GateError::PolicyIdMismatch { policy_id, expected }) => {
                assert_eq!(policy_id, "admin-payout-token");
                assert_eq!(expected, "wallet-publish-dream");
            }
            other => panic!("expected PolicyIdMismatch, got {:?}", other.map(|s| s.status)),
        }
        assert!(gate.get_decision("admin-payout-token").unwrap().is_none());
        assert!(!gate.is_approved("admin-payout-token").unwrap());
    }

    #[test]
    fn rules_without_quorum_take_no_requests_or_votes() {
        let gate = PolicyEnforcer::new(PolicyTableLoader::new(None), QuorumEngine::in_memory());
        let wallet = ActorContext::new("w1", ActorType::Wallet);

        let result = gate.request_quorum_approval(
            "wallet-publish-dream",
            &wallet,
            Capability::Publish,
            Scope::Dream,
            &[],
        );
        assert!(matches!(result, Err(GateError::QuorumNotRequired { .. })));

        let result = gate.cast_vote("wallet-publish-dream", &wallet, VoteDecision::Approve, None);
        assert!(matches!(result, Err(GateError::QuorumNotRequired { .. })));
        assert!(gate.get_decision("wallet-publish-dream").unwrap().is_none());
    }

    #[test]
    fn vote_on_malformed_policy_id_is_an_error() {
        let gate = enforcer(payout_table(2));
        let result = gate.cast_vote("not-a-policy", &admin("a"), VoteDecision::Approve, None);
        assert!(matches!(
            result,
            Err(GateError::Policy(PolicyError::InvalidPolicyId { .. }))
        ));
    }

    #[test]
    fn evidence_for_unlisted_kind_is_refused() {
        let gate = enforcer(payout_table(2));
        let result = gate.submit_evidence(
            "admin-payout-token",
            &QuorumEvidence::Safety {
                votes: vec![],
                require_unanimous: false,
            },
        );
        assert!(matches!(
            result,
            Err(GateError::Quorum(qg_quorum::QuorumError::KindNotRequired { .. }))
        ));
    }

    #[test]
    fn conditions_are_evaluated_against_the_actor() {
        let rule = PolicyRule::new(ActorType::Agent, Capability::Publish, Scope::Dream, true)
            .with_conditions(Conditions::new(vec![Condition::MinCompletedDreams(3)]));
        let gate = enforcer(PolicyTable::new("test-1", vec![rule.clone()]));

        let novice = ActorContext::new("bot", ActorType::Agent).with_completed_dreams(2);
        let veteran = ActorContext::new("bot", ActorType::Agent).with_completed_dreams(3);
        assert!(!gate.evaluate_conditions(&rule, &novice));
        assert!(gate.evaluate_conditions(&rule, &veteran));
        assert!(gate.check_policy(&veteran, Capability::Publish, Scope::Dream).allowed);
    }

    #[test]
    fn from_config_persists_and_audits() {
        let dir = tempdir().unwrap();
        let config = GateConfig::for_project(dir.path());
        let audit_path = config.audit_log.clone().unwrap();

        {
            let gate = PolicyEnforcer::from_config(&config).unwrap();
            let result = gate.check_policy(&admin("root"), Capability::Payout, Scope::Token);
            let policy_id = result.policy_id.unwrap();
            gate.request_quorum_approval(&policy_id, &admin("root"), Capability::Payout, Scope::Token, &[])
                .unwrap();
        }

        let gate = PolicyEnforcer::from_config(&config).unwrap();
        assert_eq!(gate.pending().unwrap().len(), 1);
        let d = gate
            .cast_vote("admin-payout-token", &admin("treasurer"), VoteDecision::Approve, None)
            .unwrap();
        assert_eq!(d.result, DecisionResult::Approved);

        let actions: Vec<AuditAction> = AuditLog::events_for(&audit_path, "admin-payout-token")
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::PolicyCheck,
                AuditAction::QuorumRequested,
                AuditAction::VoteCast
            ]
        );
        assert_eq!(AuditLog::verify_chain(&audit_path).unwrap(), 3);
    }
}
