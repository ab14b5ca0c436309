//! # qg-policy
//!
//! Rule tables for Quorum Gate.
//!
//! A [`PolicyTable`] maps (actor type, capability, scope) to a
//! [`PolicyRule`] saying whether the action is reversible, which quorum
//! kinds must review it, how many approvals it needs, and which
//! reputation [`Condition`]s the actor must satisfy.
//!
//! ## Key invariants
//!
//! - **First match wins**: rules are resolved in table order. A rule whose
//!   actor is `system` matches every actor type.
//! - **Fail closed**: unknown condition keys never pass; a table that does
//!   not validate is replaced by [`PolicyTable::fallback`].
//! - **Cached loads**: [`PolicyTableLoader`] re-reads the source at most once
//!   per TTL window, and concurrent cache misses reload once.

pub mod actor;
pub mod condition;
pub mod error;
pub mod loader;
pub mod rule;
pub mod table;

pub use actor::{ActorContext, ActorType};
pub use condition::{Condition, Conditions};
pub use error::PolicyError;
pub use loader::{PolicyTableLoader, DEFAULT_CACHE_TTL};
pub use rule::{parse_policy_id, policy_id, Capability, PolicyRule, QuorumKind, Scope};
pub use table::{PolicyTable, ShadowedRule, TableFormat};
