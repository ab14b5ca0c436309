// engine.rs — The quorum engine: votes in, decisions out.
//
// Every mutation of a decision is a read-modify-write against the store.
// The engine holds one mutex per policy id and runs each read-modify-write
// under it, plus the store's own key lock when the store is shared between
// processes, so two voters racing on the same decision are linearized and
// neither vote is lost. Votes on different policy ids do not contend. A
// key's mutex is dropped from the registry once nobody holds or waits on it.
//
// Requests, votes, evidence and clears are appended to the audit log
// when one is attached. The store write happens first; an audit failure
// is logged and does not undo the vote.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use qg_audit::{AuditAction, AuditEvent, AuditLog};
use qg_policy::{ActorContext, ActorType, QuorumKind};

use crate::error::QuorumError;
use crate::evaluator::QuorumEvidence;
use crate::store::{validate_key, MemoryQuorumStore, QuorumStore};
use crate::vote::{DecisionResult, QuorumDecision, QuorumVote, VoteDecision};

/// Owns quorum decisions and serializes changes to each one.
pub struct QuorumEngine {
    store: Box<dyn QuorumStore>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    audit: Option<Mutex<AuditLog>>,
}

impl QuorumEngine {
    pub fn new(store: impl QuorumStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            key_locks: Mutex::new(HashMap::new()),
            audit: None,
        }
    }

    /// An engine whose decisions live only for the life of the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryQuorumStore::new())
    }

    /// Record every change in the given audit log.
    pub fn with_audit(mut self, log: AuditLog) -> Self {
        self.audit = Some(Mutex::new(log));
        self
    }

    /// Cast (or replace) a vote on a decision, creating the decision if needed.
    ///
    /// `quorum_types` and `threshold` only seed a new decision; an existing
    /// decision keeps the threshold it was opened with.
    pub fn vote(
        &self,
        policy_id: &str,
        voter: &ActorContext,
        decision: VoteDecision,
        quorum_types: &[QuorumKind],
        threshold: usize,
        reason: Option<&str>,
    ) -> Result<QuorumDecision, QuorumError> {
        let updated = self.update(policy_id, quorum_types, threshold, |d| {
            d.record(QuorumVote::new(voter, decision, reason));
        })?;

        tracing::debug!(
            policy_id,
            voter = %voter.actor_id,
            vote = %decision,
            approvals = updated.approvals(),
            threshold = updated.threshold,
            "vote recorded"
        );
        if updated.result.is_terminal() {
            tracing::info!(policy_id, result = %updated.result, "quorum decision reached");
        }

        self.audit(
            AuditEvent::new(&voter.actor_id, AuditAction::VoteCast)
                .with_policy_id(policy_id)
                .with_metadata(serde_json::json!({
                    "voter_type": voter.actor_type,
                    "decision": decision,
                    "reason": reason,
                    "result": updated.result,
                    "approvals": updated.approvals(),
                    "threshold": updated.threshold,
                })),
        );
        Ok(updated)
    }

    /// Open a decision on behalf of a requester.
    ///
    /// A decision that already reached a terminal result is returned
    /// unchanged. Otherwise the requester is recorded and, when
    /// `counts_toward_quorum`, so is their approval.
    pub fn request(
        &self,
        policy_id: &str,
        requester: &ActorContext,
        counts_toward_quorum: bool,
        quorum_types: &[QuorumKind],
        threshold: usize,
    ) -> Result<QuorumDecision, QuorumError> {
        let mut was_terminal = false;
        let updated = self.update(policy_id, quorum_types, threshold, |d| {
            if d.result.is_terminal() {
                was_terminal = true;
                return;
            }
            if d.requested_by.is_none() {
                d.requested_by = Some(requester.actor_id.clone());
            }
            if counts_toward_quorum {
                d.record(QuorumVote::new(
                    requester,
                    VoteDecision::Approve,
                    Some("requested"),
                ));
            }
        })?;

        if was_terminal {
            tracing::debug!(policy_id, result = %updated.result, "quorum already decided");
            return Ok(updated);
        }

        tracing::info!(
            policy_id,
            requester = %requester.actor_id,
            approvals = updated.approvals(),
            threshold = updated.threshold,
            "quorum requested"
        );
        self.audit(
            AuditEvent::new(&requester.actor_id, AuditAction::QuorumRequested)
                .with_policy_id(policy_id)
                .with_metadata(serde_json::json!({
                    "quorum_types": quorum_types,
                    "threshold": updated.threshold,
                    "counts_toward_quorum": counts_toward_quorum,
                    "result": updated.result,
                })),
        );
        Ok(updated)
    }

    /// Evaluate evidence for one quorum kind and record the verdict as a
    /// vote from the synthetic voter `quorum:<kind>`.
    ///
    /// The kind must be one of `quorum_types`.
    pub fn submit_evidence(
        &self,
        policy_id: &str,
        evidence: &QuorumEvidence,
        quorum_types: &[QuorumKind],
        threshold: usize,
    ) -> Result<QuorumDecision, QuorumError> {
        let kind = evidence.kind();
        if !quorum_types.contains(&kind) {
            return Err(QuorumError::KindNotRequired {
                kind,
                policy_id: policy_id.to_string(),
            });
        }

        let voter = ActorContext::new(format!("quorum:{}", kind), ActorType::System);
        let mut passed = false;
        let updated = self.update(policy_id, quorum_types, threshold, |d| {
            passed = evidence.evaluate(&d.votes);
            let verdict = if passed {
                VoteDecision::Approve
            } else {
                VoteDecision::Reject
            };
            let reason = format!("{} quorum evaluated", kind);
            d.record(QuorumVote::new(&voter, verdict, Some(reason.as_str())));
        })?;

        tracing::info!(policy_id, kind = %kind, passed, result = %updated.result, "quorum evidence evaluated");
        self.audit(
            AuditEvent::new(&voter.actor_id, AuditAction::EvidenceSubmitted)
                .with_policy_id(policy_id)
                .with_metadata(serde_json::json!({
                    "evidence": evidence,
                    "passed": passed,
                    "result": updated.result,
                })),
        );
        Ok(updated)
    }

    pub fn get_decision(&self, policy_id: &str) -> Result<Option<QuorumDecision>, QuorumError> {
        self.store.get(policy_id)
    }

    /// True iff the decision exists and is approved.
    pub fn is_approved(&self, policy_id: &str) -> Result<bool, QuorumError> {
        Ok(self
            .store
            .get(policy_id)?
            .is_some_and(|d| d.result == DecisionResult::Approved))
    }

    /// Remove a decision so the action can go through a fresh round.
    /// Returns whether a decision existed.
    pub fn clear_decision(&self, policy_id: &str, cleared_by: &str) -> Result<bool, QuorumError> {
        validate_key(policy_id)?;
        let removed = self.locked(policy_id, || self.store.remove(policy_id))?;

        if removed {
            tracing::info!(policy_id, cleared_by, "quorum decision cleared");
            self.audit(
                AuditEvent::new(cleared_by, AuditAction::DecisionCleared).with_policy_id(policy_id),
            );
        }
        Ok(removed)
    }

    /// Every decision still waiting for votes.
    pub fn pending_decisions(&self) -> Result<Vec<QuorumDecision>, QuorumError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter(|d| d.result == DecisionResult::Pending)
            .collect())
    }

    /// Every decision, oldest first.
    pub fn all_decisions(&self) -> Result<Vec<QuorumDecision>, QuorumError> {
        self.store.list()
    }

    /// Drop every decision. Each one is removed under its key lock, so a
    /// write already in flight finishes first and is then removed.
    pub fn reset(&self) -> Result<(), QuorumError> {
        for decision in self.store.list()? {
            let id = decision.policy_id.as_str();
            self.locked(id, || self.store.remove(id))?;
        }
        Ok(())
    }

    /// Load-or-create the decision, apply `change` and persist it, all under
    /// the policy id's lock.
    fn update(
        &self,
        policy_id: &str,
        quorum_types: &[QuorumKind],
        threshold: usize,
        change: impl FnOnce(&mut QuorumDecision),
    ) -> Result<QuorumDecision, QuorumError> {
        validate_key(policy_id)?;
        self.locked(policy_id, || {
            let mut decision = match self.store.get(policy_id)? {
                Some(existing) => existing,
                None => QuorumDecision::new(policy_id, quorum_types, threshold),
            };
            change(&mut decision);
            self.store.put(&decision)?;
            Ok(decision)
        })
    }

    /// Run `f` holding the policy id's mutex and the store's key lock.
    fn locked<T>(
        &self,
        policy_id: &str,
        f: impl FnOnce() -> Result<T, QuorumError>,
    ) -> Result<T, QuorumError> {
        let lock = self.key_lock(policy_id)?;
        let result = match lock.lock() {
            Ok(_guard) => self.store.lock_key(policy_id).and_then(|_held| f()),
            Err(e) => Err(QuorumError::LockPoisoned(e.to_string())),
        };
        drop(lock);
        self.release_key(policy_id);
        result
    }

    fn key_lock(&self, policy_id: &str) -> Result<Arc<Mutex<()>>, QuorumError> {
        let mut locks = self
            .key_locks
            .lock()
            .map_err(|e| QuorumError::LockPoisoned(e.to_string()))?;
        Ok(Arc::clone(locks.entry(policy_id.to_string()).or_default()))
    }

    /// Forget a key's mutex when the registry holds the only reference.
    /// Handles are only cloned under the registry lock, so nobody can pick
    /// this one up between the check and the removal.
    fn release_key(&self, policy_id: &str) {
        if let Ok(mut locks) = self.key_locks.lock() {
            if locks
                .get(policy_id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(policy_id);
            }
        }
    }

    fn audit(&self, mut event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        let result = match audit.lock() {
            Ok(mut log) => log.append(&mut event).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            tracing::warn!(action = %event.action, error = %e, "failed to write audit event");
        }
    }

    /// Append an event for a step taken outside the engine (checks, requests).
    pub fn record_audit(&self, event: AuditEvent) {
        self.audit(event);
    }
}

impl Default for QuorumEngine {
    fn default() -> Self {
        Self::in_memory()
    }
}
