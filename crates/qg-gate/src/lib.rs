//! # qg-gate
//!
//! The front door of Quorum Gate: decides whether an actor may perform a
//! sensitive capability within a scope, and drives multi-party approval when
//! the action is too risky to run unilaterally.
//!
//! ```rust,no_run
//! use qg_gate::{GateConfig, PolicyEnforcer, Verdict};
//! use qg_policy::{ActorContext, ActorType, Capability, Scope};
//!
//! let config = GateConfig::for_project(".");
//! let gate = PolicyEnforcer::from_config(&config).unwrap();
//! let admin = ActorContext::new("admin-1", ActorType::Admin);
//!
//! match gate.check_policy(&admin, Capability::Deploy, Scope::Infrastructure).verdict() {
//!     Verdict::Allowed => { /* run it */ }
//!     Verdict::PendingQuorum { policy_id, .. } => {
//!         let status = gate
//!             .request_quorum_approval(&policy_id, &admin, Capability::Deploy, Scope::Infrastructure, &[])
//!             .unwrap();
//!         println!("{} is {}", status.policy_id, status.status);
//!     }
//!     Verdict::Denied { reason } => eprintln!("denied: {}", reason),
//! }
//! ```
//!
//! ## Contract
//!
//! - `check_policy` never fails. Missing rules and unmet conditions are
//!   structured denials with a display-ready reason.
//! - Everything that needs the rule to exist (`request_quorum_approval`,
//!   `cast_vote`, `submit_evidence`) returns `Result<_, GateError>`.

pub mod check;
pub mod config;
pub mod enforcer;
pub mod error;

pub use check::{
    check_against, evaluate_conditions, PolicyCheckResult, QuorumStatus, Verdict,
    REASON_CONDITIONS_NOT_MET, REASON_NO_RULE,
};
pub use config::GateConfig;
pub use enforcer::PolicyEnforcer;
pub use error::GateError;
