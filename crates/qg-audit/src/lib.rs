//! # qg-audit
//!
//! Append-only audit trail for Quorum Gate.
//!
//! Every policy check, quorum request, vote, evidence submission and
//! decision clear is recorded as an [`AuditEvent`] in a JSONL log. Events
//! are hash-chained so that deleting or editing a vote after the fact is
//! detectable with [`AuditLog::verify_chain`].
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use qg_audit::{AuditAction, AuditEvent, AuditLog};
//!
//! let mut log = AuditLog::open("/tmp/qg-audit.jsonl").unwrap();
//! let mut event = AuditEvent::new("admin-1", AuditAction::VoteCast)
//!     .with_policy_id("admin-deploy-infrastructure");
//! log.append(&mut event).unwrap();
//! ```

pub mod error;
pub mod event;
pub mod hasher;
pub mod log;

pub use error::AuditError;
pub use event::{AuditAction, AuditEvent};
pub use log::AuditLog;
