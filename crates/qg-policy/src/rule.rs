// rule.rs — One row of policy and the closed enumerations it is built from.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::actor::ActorType;
use crate::condition::Conditions;
use crate::error::PolicyError;

/// A sensitive action an actor may ask to perform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Publish,
    Remix,
    Monetize,
    Archive,
    Deploy,
    ModifySchema,
    ManageKeys,
    Payout,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Publish,
        Capability::Remix,
        Capability::Monetize,
        Capability::Archive,
        Capability::Deploy,
        Capability::ModifySchema,
        Capability::ManageKeys,
        Capability::Payout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Publish => "publish",
            Capability::Remix => "remix",
            Capability::Monetize => "monetize",
            Capability::Archive => "archive",
            Capability::Deploy => "deploy",
            Capability::ModifySchema => "modify_schema",
            Capability::ManageKeys => "manage_keys",
            Capability::Payout => "payout",
        }
    }
}

/// What the action applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Dream,
    Agent,
    Token,
    Infrastructure,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Global,
        Scope::Dream,
        Scope::Agent,
        Scope::Token,
        Scope::Infrastructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Dream => "dream",
            Scope::Agent => "agent",
            Scope::Token => "token",
            Scope::Infrastructure => "infrastructure",
        }
    }
}

/// A reviewing body whose approval a rule can require.
///
/// Each kind has its own approval semantics (see `qg-quorum`):
/// - `Tech`: automated test pass rate plus agent majority
/// - `Creator`: stake-weighted approval rate
/// - `Safety`: near-unanimous guard approval
/// - `Admin`: majority of the admins voting on the decision
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum QuorumKind {
    Tech,
    Creator,
    Safety,
    Admin,
}

impl QuorumKind {
    pub const ALL: [QuorumKind; 4] = [
        QuorumKind::Tech,
        QuorumKind::Creator,
        QuorumKind::Safety,
        QuorumKind::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuorumKind::Tech => "tech",
            QuorumKind::Creator => "creator",
            QuorumKind::Safety => "safety",
            QuorumKind::Admin => "admin",
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ty, $kind:literal) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| PolicyError::UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

display_and_parse!(Capability, "capability");
display_and_parse!(Scope, "scope");
display_and_parse!(QuorumKind, "quorum kind");

/// One row of a policy table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyRule {
    /// Actor type this rule applies to. `system` matches any actor.
    pub actor: ActorType,
    pub capability: Capability,
    pub scope: Scope,
    /// Whether the action can be undone after execution.
    pub reversible: bool,
    /// Quorum kinds that must review the action, in priority order.
    /// Empty means the action needs no quorum.
    #[serde(default)]
    pub review_quorum: Vec<QuorumKind>,
    /// Approvals needed. Defaults to half the quorum kinds, rounded up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_approvals: Option<usize>,
    /// Reputation conditions the actor must meet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

impl PolicyRule {
    /// A rule with no quorum and no conditions.
    pub fn new(actor: ActorType, capability: Capability, scope: Scope, reversible: bool) -> Self {
        Self {
            actor,
            capability,
            scope,
            reversible,
            review_quorum: Vec::new(),
            min_approvals: None,
            conditions: None,
        }
    }

    pub fn with_quorum(mut self, kinds: impl IntoIterator<Item = QuorumKind>) -> Self {
        self.review_quorum = kinds.into_iter().collect();
        self
    }

    pub fn with_min_approvals(mut self, min: usize) -> Self {
        self.min_approvals = Some(min);
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Whether this rule applies to the given request.
    pub fn matches(&self, actor_type: ActorType, capability: Capability, scope: Scope) -> bool {
        (self.actor == actor_type || self.actor == ActorType::System)
            && self.capability == capability
            && self.scope == scope
    }

    pub fn requires_quorum(&self) -> bool {
        !self.review_quorum.is_empty()
    }

    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    /// `min_approvals` if set, else ceil(|review_quorum| / 2).
    pub fn min_approvals(&self) -> usize {
        self.min_approvals
            .unwrap_or_else(|| self.review_quorum.len().div_ceil(2))
    }

    /// The first listed quorum kind, used to label decisions.
    pub fn primary_quorum(&self) -> Option<QuorumKind> {
        self.review_quorum.first().copied()
    }
}

/// Deterministic decision key: `<actorType>-<capability>-<scope>`.
pub fn policy_id(actor_type: ActorType, capability: Capability, scope: Scope) -> String {
    format!("{}-{}-{}", actor_type, capability, scope)
}

/// Inverse of [`policy_id`].
///
/// Capabilities use underscores, never dashes, so the id splits cleanly.
pub fn parse_policy_id(id: &str) -> Result<(ActorType, Capability, Scope), PolicyError> {
    let invalid = || PolicyError::InvalidPolicyId {
        policy_id: id.to_string(),
    };
    let mut parts = id.split('-');
    let (Some(actor), Some(capability), Some(scope), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    Ok((
        actor.parse().map_err(|_| invalid())?,
        capability.parse().map_err(|_| invalid())?,
        scope.parse().map_err(|_| invalid())?,
    ))
}
