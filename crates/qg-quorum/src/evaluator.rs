// evaluator.rs — Approval semantics for each quorum kind.
//
// The stored decision tallies plain votes. Some reviewing bodies decide by
// other rules:
//
// - Tech: automated tests must pass at >= 80% and reviewing agents must
//   approve by simple majority.
// - Creator: the stake-weighted approval rate must meet a threshold.
// - Safety: guards must approve at >= 90%, or unanimously when required.
//   No guard votes never passes.
// - Admin: admins recorded on the decision approve by simple majority.
//
// These are pure functions. `QuorumEvidence` selects one by kind, and the
// engine can fold the verdict back into a decision as a synthetic vote.

use qg_policy::{ActorType, QuorumKind};
use serde::{Deserialize, Serialize};

use crate::vote::{QuorumVote, VoteDecision};

/// Minimum automated-test pass rate for the tech quorum.
pub const TECH_PASS_RATE: f64 = 0.8;

/// Minimum guard approval rate for the (non-unanimous) safety quorum.
pub const SAFETY_APPROVAL_RATE: f64 = 0.9;

/// Outcome of an automated test run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResults {
    pub passed: u32,
    pub total: u32,
}

impl TestResults {
    /// Pass rate in [0, 1]. An empty run has a rate of 0.
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.passed) / f64::from(self.total)
        }
    }
}

/// A reviewing agent's vote in the tech quorum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentVote {
    pub agent_id: String,
    pub decision: VoteDecision,
}

/// A wallet's stake-weighted vote in the creator quorum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StakeVote {
    pub wallet: String,
    pub stake: f64,
    pub decision: VoteDecision,
}

/// A safety guard's vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuardVote {
    pub guard_id: String,
    pub decision: VoteDecision,
}

impl AgentVote {
    pub fn new(agent_id: impl Into<String>, decision: VoteDecision) -> Self {
        Self {
            agent_id: agent_id.into(),
            decision,
        }
    }
}

impl StakeVote {
    pub fn new(wallet: impl Into<String>, stake: f64, decision: VoteDecision) -> Self {
        Self {
            wallet: wallet.into(),
            stake,
            decision,
        }
    }
}

impl GuardVote {
    pub fn new(guard_id: impl Into<String>, decision: VoteDecision) -> Self {
        Self {
            guard_id: guard_id.into(),
            decision,
        }
    }
}

/// Tests pass at >= 80% and agent approvals outnumber agent rejections.
pub fn check_tech_quorum(tests: &TestResults, agent_votes: &[AgentVote]) -> bool {
    let approvals = agent_votes
        .iter()
        .filter(|v| v.decision == VoteDecision::Approve)
        .count();
    let rejections = agent_votes
        .iter()
        .filter(|v| v.decision == VoteDecision::Reject)
        .count();
    tests.pass_rate() >= TECH_PASS_RATE && approvals > rejections
}

/// Approving stake over total stake meets `threshold`. Zero total stake fails.
pub fn check_creator_quorum(votes: &[StakeVote], threshold: f64) -> bool {
    let total: f64 = votes.iter().map(|v| v.stake).sum();
    let approving: f64 = votes
        .iter()
        .filter(|v| v.decision == VoteDecision::Approve)
        .map(|v| v.stake)
        .sum();
    let approval_rate = if total > 0.0 { approving / total } else { 0.0 };
    approval_rate >= threshold
}

/// Guards approve at >= 90%, or with no rejection at all when unanimity is
/// required. An empty vote set always fails.
pub fn check_safety_quorum(votes: &[GuardVote], require_unanimous: bool) -> bool {
    if votes.is_empty() {
        return false;
    }
    if require_unanimous {
        return !votes.iter().any(|v| v.decision == VoteDecision::Reject);
    }
    let approvals = votes
        .iter()
        .filter(|v| v.decision == VoteDecision::Approve)
        .count();
    approvals as f64 / votes.len() as f64 >= SAFETY_APPROVAL_RATE
}

/// Admin-type voters on a decision approve by simple majority.
pub fn check_admin_quorum(votes: &[QuorumVote]) -> bool {
    let admin = |d: VoteDecision| {
        votes
            .iter()
            .filter(|v| v.voter_type == ActorType::Admin && v.decision == d)
            .count()
    };
    admin(VoteDecision::Approve) > admin(VoteDecision::Reject)
}

/// Input for one quorum kind's evaluator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum QuorumEvidence {
    Tech {
        tests: TestResults,
        #[serde(default)]
        agent_votes: Vec<AgentVote>,
    },
    Creator {
        votes: Vec<StakeVote>,
        threshold: f64,
    },
    Safety {
        votes: Vec<GuardVote>,
        #[serde(default)]
        require_unanimous: bool,
    },
    /// Evaluated against the votes already recorded on the decision.
    Admin,
}

impl QuorumEvidence {
    pub fn kind(&self) -> QuorumKind {
        match self {
            QuorumEvidence::Tech { .. } => QuorumKind::Tech,
            QuorumEvidence::Creator { .. } => QuorumKind::Creator,
            QuorumEvidence::Safety { .. } => QuorumKind::Safety,
            QuorumEvidence::Admin => QuorumKind::Admin,
        }
    }

    /// Run the evaluator for this kind. `recorded` is the decision's current votes.
    pub fn evaluate(&self, recorded: &[QuorumVote]) -> bool {
        match self {
            QuorumEvidence::Tech { tests, agent_votes } => check_tech_quorum(tests, agent_votes),
            QuorumEvidence::Creator { votes, threshold } => check_creator_quorum(votes, *threshold),
            QuorumEvidence::Safety {
                votes,
                require_unanimous,
            } => check_safety_quorum(votes, *require_unanimous),
            QuorumEvidence::Admin => check_admin_quorum(recorded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_policy::ActorContext;

    use crate::vote::VoteDecision::{Abstain, Approve, Reject};

    #[test]
    fn tech_quorum_needs_pass_rate_and_agent_majority() {
        let votes = vec![
            AgentVote::new("a1", Approve),
            AgentVote::new("a2", Approve),
            AgentVote::new("a3", Reject),
        ];
        assert!(check_tech_quorum(&TestResults { passed: 85, total: 100 }, &votes));
        assert!(check_tech_quorum(&TestResults { passed: 80, total: 100 }, &votes));
        assert!(!check_tech_quorum(&TestResults { passed: 79, total: 100 }, &votes));

        let split = vec![AgentVote::new("a1", Approve), AgentVote::new("a2", Reject)];
        assert!(!check_tech_quorum(&TestResults { passed: 100, total: 100 }, &split));
    }

    #[test]
    fn tech_quorum_with_no_tests_fails() {
        let votes = vec![AgentVote::new("a1", Approve)];
        assert!(!check_tech_quorum(&TestResults { passed: 0, total: 0 }, &votes));
    }

    #[test]
    fn creator_quorum_is_stake_weighted() {
        assert!(check_creator_quorum(&[StakeVote::new("w1", 90.0, Approve)], 0.8));
        assert!(!check_creator_quorum(&[], 0.8));

        let votes = vec![
            StakeVote::new("whale", 70.0, Approve),
            StakeVote::new("m1", 10.0, Reject),
            StakeVote::new("m2", 10.0, Reject),
            StakeVote::new("m3", 10.0, Abstain),
        ];
        assert!(check_creator_quorum(&votes, 0.7));
        assert!(!check_creator_quorum(&votes, 0.71));
    }

    #[test]
    fn creator_quorum_with_zero_stake_fails() {
        let votes = vec![StakeVote::new("w1", 0.0, Approve)];
        assert!(!check_creator_quorum(&votes, 0.5));
    }

    #[test]
    fn safety_quorum_empty_fails_safe() {
        assert!(!check_safety_quorum(&[], false));
        assert!(!check_safety_quorum(&[], true));
    }

    #[test]
    fn safety_quorum_unanimity_broken_by_one_rejection() {
        let votes = vec![GuardVote::new("g1", Approve), GuardVote::new("g2", Reject)];
        assert!(!check_safety_quorum(&votes, true));

        let with_abstain = vec![GuardVote::new("g1", Approve), GuardVote::new("g2", Abstain)];
        assert!(check_safety_quorum(&with_abstain, true));
    }

    #[test]
    fn safety_quorum_needs_ninety_percent() {
        let mut votes: Vec<GuardVote> = (0..9)
            .map(|i| GuardVote::new(format!("g{}", i), Approve))
            .collect();
        votes.push(GuardVote::new("g9", Reject));
        assert!(check_safety_quorum(&votes, false));

        votes.push(GuardVote::new("g10", Abstain));
        assert!(!check_safety_quorum(&votes, false));
    }

    #[test]
    fn admin_quorum_counts_only_admin_voters() {
        let admin = ActorContext::new("root", ActorType::Admin);
        let wallet = ActorContext::new("w1", ActorType::Wallet);
        let other_wallet = ActorContext::new("w2", ActorType::Wallet);

        let votes = vec![
            QuorumVote::new(&admin, Approve, None),
            QuorumVote::new(&wallet, Reject, None),
            QuorumVote::new(&other_wallet, Reject, None),
        ];
        assert!(check_admin_quorum(&votes));
        assert!(!check_admin_quorum(&votes[1..]));
    }

    #[test]
    fn evidence_dispatches_by_kind() {
        let evidence = QuorumEvidence::Safety {
            votes: vec![GuardVote::new("g1", Approve)],
            require_unanimous: true,
        };
        assert_eq!(evidence.kind(), QuorumKind::Safety);
        assert!(evidence.evaluate(&[]));
        assert!(!QuorumEvidence::Admin.evaluate(&[]));
    }

    #[test]
    fn evidence_is_tagged_by_kind() {
        let evidence: QuorumEvidence = serde_json::from_str(
            r#"{"kind":"tech","tests":{"passed":9,"total":10},"agentVotes":[{"agentId":"a1","decision":"approve"}]}"#,
        )
        .unwrap();
        assert_eq!(evidence.kind(), QuorumKind::Tech);
        assert!(evidence.evaluate(&[]));
    }

    #[test]
    fn evidence_fields_are_camel_case() {
        let safety = QuorumEvidence::Safety {
            votes: vec![GuardVote::new("g1", Approve)],
            require_unanimous: true,
        };
        let json = serde_json::to_value(&safety).unwrap();
        assert_eq!(json["kind"], "safety");
        assert_eq!(json["requireUnanimous"], true);
        assert_eq!(json["votes"][0]["guardId"], "g1");

        let parsed: QuorumEvidence = serde_json::from_str(
            r#"{"kind":"safety","votes":[{"guardId":"g1","decision":"approve"}],"requireUnanimous":true}"#,
        )
        .unwrap();
        assert_eq!(parsed, safety);
    }
}
