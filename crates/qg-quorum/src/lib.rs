//! # qg-quorum
//!
//! Multi-party approval for actions too risky to run unilaterally.
//!
//! A [`QuorumDecision`] is keyed by policy id and accumulates one
//! [`QuorumVote`] per voter. The [`QuorumEngine`] owns the decisions through
//! a [`QuorumStore`] and serializes mutation per policy id, so concurrent
//! votes on the same decision are never lost.
//!
//! Quorum kinds with non-majority semantics (test pass rates, stake
//! weighting, near-unanimous safety guards) are evaluated by the functions
//! in [`evaluator`], selected through [`QuorumEvidence`].
//!
//! ## Tally rule
//!
//! `reached = approvals >= threshold`. The result is `approved` when reached,
//! otherwise `rejected` when rejections outnumber approvals, otherwise
//! `pending`. Abstentions count toward neither side.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod store;
pub mod vote;

pub use engine::QuorumEngine;
pub use error::QuorumError;
pub use evaluator::{
    check_admin_quorum, check_creator_quorum, check_safety_quorum, check_tech_quorum, AgentVote,
    GuardVote, QuorumEvidence, StakeVote, TestResults,
};
pub use store::{JsonQuorumStore, KeyGuard, MemoryQuorumStore, QuorumStore};
pub use vote::{DecisionResult, QuorumDecision, QuorumVote, VoteDecision};
