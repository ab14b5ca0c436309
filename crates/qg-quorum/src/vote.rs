// vote.rs — Votes, decisions and the tally rule.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use qg_policy::{ActorContext, ActorType, PolicyError, QuorumKind};
use serde::{Deserialize, Serialize};

/// How a voter voted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    Approve,
    Reject,
    Abstain,
}

impl std::fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteDecision::Approve => write!(f, "approve"),
            VoteDecision::Reject => write!(f, "reject"),
            VoteDecision::Abstain => write!(f, "abstain"),
        }
    }
}

impl FromStr for VoteDecision {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(VoteDecision::Approve),
            "reject" => Ok(VoteDecision::Reject),
            "abstain" => Ok(VoteDecision::Abstain),
            other => Err(PolicyError::UnknownValue {
                kind: "vote decision",
                value: other.to_string(),
            }),
        }
    }
}

/// Where a decision stands.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionResult {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl DecisionResult {
    /// Approved and rejected are terminal; pending is not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DecisionResult::Pending)
    }
}

impl std::fmt::Display for DecisionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionResult::Pending => write!(f, "pending"),
            DecisionResult::Approved => write!(f, "approved"),
            DecisionResult::Rejected => write!(f, "rejected"),
        }
    }
}

/// One voter's current vote on a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuorumVote {
    pub voter: String,
    pub voter_type: ActorType,
    pub decision: VoteDecision,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl QuorumVote {
    pub fn new(voter: &ActorContext, decision: VoteDecision, reason: Option<&str>) -> Self {
        Self {
            voter: voter.actor_id.clone(),
            voter_type: voter.actor_type,
            decision,
            timestamp: Utc::now(),
            reason: reason.map(str::to_string),
        }
    }
}

/// The state of multi-party approval for one policy id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuorumDecision {
    pub policy_id: String,
    /// The primary quorum kind (first of the rule's review quorum).
    pub quorum_type: Option<QuorumKind>,
    /// At most one vote per voter id.
    pub votes: Vec<QuorumVote>,
    /// Approvals needed to reach the decision.
    pub threshold: usize,
    pub reached: bool,
    pub result: DecisionResult,
    /// When the decision was opened.
    pub timestamp: DateTime<Utc>,
    /// When the last vote was recorded.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// The actor whose request opened the decision, if opened by a request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

impl QuorumDecision {
    /// A fresh pending decision with no votes.
    pub fn new(policy_id: impl Into<String>, quorum_types: &[QuorumKind], threshold: usize) -> Self {
        let now = Utc::now();
        let mut decision = Self {
            policy_id: policy_id.into(),
            quorum_type: quorum_types.first().copied(),
            votes: Vec::new(),
            threshold,
            reached: false,
            result: DecisionResult::Pending,
            timestamp: now,
            updated_at: now,
            requested_by: None,
        };
        decision.recompute();
        decision
    }

    /// Record a vote, replacing any earlier vote from the same voter, and re-tally.
    pub fn record(&mut self, vote: QuorumVote) {
        self.updated_at = vote.timestamp;
        match self.votes.iter_mut().find(|v| v.voter == vote.voter) {
            Some(existing) => *existing = vote,
            None => self.votes.push(vote),
        }
        self.recompute();
    }

    pub fn approvals(&self) -> usize {
        self.count(VoteDecision::Approve)
    }

    pub fn rejections(&self) -> usize {
        self.count(VoteDecision::Reject)
    }

    pub fn vote_of(&self, voter: &str) -> Option<&QuorumVote> {
        self.votes.iter().find(|v| v.voter == voter)
    }

    fn count(&self, decision: VoteDecision) -> usize {
        self.votes.iter().filter(|v| v.decision == decision).count()
    }

    fn recompute(&mut self) {
        let approvals = self.approvals();
        let rejections = self.rejections();
        self.reached = approvals >= self.threshold;
        self.result = if self.reached {
            DecisionResult::Approved
        } else if rejections > approvals {
            DecisionResult::Rejected
        } else {
            DecisionResult::Pending
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(id: &str) -> ActorContext {
        ActorContext::new(id, ActorType::Admin)
    }

    fn decision(threshold: usize) -> QuorumDecision {
        QuorumDecision::new(
            "admin-deploy-infrastructure",
            &[QuorumKind::Tech, QuorumKind::Safety],
            threshold,
        )
    }

    #[test]
    fn new_decision_is_pending_with_primary_kind() {
        let d = decision(2);
        assert_eq!(d.result, DecisionResult::Pending);
        assert!(!d.reached);
        assert_eq!(d.quorum_type, Some(QuorumKind::Tech));
        assert!(d.votes.is_empty());
    }

    #[test]
    fn revote_replaces_earlier_vote() {
        let mut d = decision(2);
        d.record(QuorumVote::new(&admin("a1"), VoteDecision::Approve, None));
        d.record(QuorumVote::new(&admin("a1"), VoteDecision::Reject, Some("changed mind")));

        assert_eq!(d.votes.len(), 1);
        let vote = d.vote_of("a1").unwrap();
        assert_eq!(vote.decision, VoteDecision::Reject);
        assert_eq!(vote.reason.as_deref(), Some("changed mind"));
        assert_eq!(d.result, DecisionResult::Rejected);
    }

    #[test]
    fn threshold_crossing_approves() {
        let mut d = decision(2);
        d.record(QuorumVote::new(&admin("a1"), VoteDecision::Approve, None));
        assert_eq!(d.result, DecisionResult::Pending);
        d.record(QuorumVote::new(&admin("a2"), VoteDecision::Approve, None));
        assert_eq!(d.result, DecisionResult::Approved);
        assert!(d.reached);
    }

    #[test]
    fn rejections_outnumbering_approvals_reject() {
        let mut d = decision(2);
        d.record(QuorumVote::new(&admin("a1"), VoteDecision::Reject, None));
        assert_eq!(d.result, DecisionResult::Rejected);
        assert!(!d.reached);
    }

    #[test]
    fn tie_stays_pending_and_abstain_is_neutral() {
        let mut d = decision(3);
        d.record(QuorumVote::new(&admin("a1"), VoteDecision::Approve, None));
        d.record(QuorumVote::new(&admin("a2"), VoteDecision::Reject, None));
        d.record(QuorumVote::new(&admin("a3"), VoteDecision::Abstain, None));
        assert_eq!(d.approvals(), 1);
        assert_eq!(d.rejections(), 1);
        assert_eq!(d.result, DecisionResult::Pending);
    }

    #[test]
    fn zero_threshold_is_approved_immediately() {
        let d = QuorumDecision::new("wallet-publish-dream", &[], 0);
        assert_eq!(d.result, DecisionResult::Approved);
        assert_eq!(d.quorum_type, None);
    }

    #[test]
    fn decision_serializes_camel_case() {
        let mut d = decision(1);
        d.record(QuorumVote::new(&admin("a1"), VoteDecision::Approve, None));
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["policyId"], "admin-deploy-infrastructure");
        assert_eq!(json["quorumType"], "tech");
        assert_eq!(json["result"], "approved");
        assert_eq!(json["votes"][0]["voterType"], "admin");
    }
}
