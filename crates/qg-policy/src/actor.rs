// actor.rs — Who is asking.
//
// An ActorContext is a snapshot supplied by the caller for a single request.
// The engine reads the reputation signals but never mutates or stores them.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// The kind of identity performing an action.
///
/// In a rule, `System` is a wildcard that matches every actor type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Agent,
    Wallet,
    System,
    Admin,
}

impl ActorType {
    pub const ALL: [ActorType; 4] = [
        ActorType::Agent,
        ActorType::Wallet,
        ActorType::System,
        ActorType::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Agent => "agent",
            ActorType::Wallet => "wallet",
            ActorType::System => "system",
            ActorType::Admin => "admin",
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActorType {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PolicyError::UnknownValue {
                kind: "actor type",
                value: s.to_string(),
            })
    }
}

/// The identity and reputation signals of the requesting actor.
///
/// Missing numeric signals count as zero when conditions are evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub actor_id: String,
    pub actor_type: ActorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staked_tokens: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_dreams: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub badges: BTreeSet<String>,
}

impl ActorContext {
    /// An actor with no reputation signals.
    pub fn new(actor_id: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_type,
            trust_score: None,
            staked_tokens: None,
            completed_dreams: None,
            badges: BTreeSet::new(),
        }
    }

    pub fn with_trust_score(mut self, score: f64) -> Self {
        self.trust_score = Some(score);
        self
    }

    pub fn with_staked_tokens(mut self, tokens: f64) -> Self {
        self.staked_tokens = Some(tokens);
        self
    }

    pub fn with_completed_dreams(mut self, count: u64) -> Self {
        self.completed_dreams = Some(count);
        self
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badges.insert(badge.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_type_parses_lowercase_names() {
        assert_eq!("wallet".parse::<ActorType>().unwrap(), ActorType::Wallet);
        assert_eq!("admin".parse::<ActorType>().unwrap(), ActorType::Admin);
        assert!(matches!(
            "Wallet".parse::<ActorType>(),
            Err(PolicyError::UnknownValue { .. })
        ));
    }

    #[test]
    fn actor_context_uses_camel_case_fields() {
        let actor = ActorContext::new("w-1", ActorType::Wallet)
            .with_trust_score(0.7)
            .with_badge("early-dreamer");
        let json = serde_json::to_value(&actor).unwrap();
        assert_eq!(json["actorId"], "w-1");
        assert_eq!(json["actorType"], "wallet");
        assert_eq!(json["trustScore"], 0.7);
        assert!(json.get("stakedTokens").is_none());
    }

    #[test]
    fn missing_signals_deserialize_as_none() {
        let actor: ActorContext =
            serde_json::from_str(r#"{"actorId":"a-1","actorType":"agent"}"#).unwrap();
        assert_eq!(actor.trust_score, None);
        assert!(actor.badges.is_empty());
    }
}
