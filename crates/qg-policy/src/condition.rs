// condition.rs — Reputation conditions attached to a rule.
//
// On disk conditions are a map of condition name → threshold:
//
//   conditions:
//     minTrustScore: 0.8
//     requiredBadges: ["verified-creator"]
//
// In memory they are a closed set of variants, each with its own predicate.
// Keys outside the set become `Unrecognized` and never pass. A recognized
// key with a threshold of the wrong type is a schema error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actor::ActorContext;

/// A single condition on the requesting actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `trust_score` (default 0) must be at least this value.
    MinTrustScore(f64),
    /// `staked_tokens` (default 0) must be at least this value.
    MinStakedTokens(f64),
    /// `completed_dreams` (default 0) must be at least this value.
    MinCompletedDreams(u64),
    /// Every listed badge must be held.
    RequiredBadges(Vec<String>),
    /// A key this engine does not know. Always fails.
    Unrecognized { key: String, threshold: Value },
}

impl Condition {
    /// Build a condition from one `key: threshold` entry.
    pub fn from_entry(key: &str, threshold: &Value) -> Result<Self, String> {
        let number = || {
            threshold
                .as_f64()
                .ok_or_else(|| format!("condition '{}' needs a numeric threshold", key))
        };
        match key {
            "minTrustScore" => Ok(Condition::MinTrustScore(number()?)),
            "minStakedTokens" => Ok(Condition::MinStakedTokens(number()?)),
            "minCompletedDreams" => threshold
                .as_u64()
                .map(Condition::MinCompletedDreams)
                .ok_or_else(|| {
                    format!("condition '{}' needs a non-negative integer threshold", key)
                }),
            "requiredBadges" => {
                let badges = threshold
                    .as_array()
                    .and_then(|items| {
                        items
                            .iter()
                            .map(|b| b.as_str().map(str::to_string))
                            .collect::<Option<Vec<_>>>()
                    })
                    .ok_or_else(|| format!("condition '{}' needs a list of badge names", key))?;
                Ok(Condition::RequiredBadges(badges))
            }
            other => Ok(Condition::Unrecognized {
                key: other.to_string(),
                threshold: threshold.clone(),
            }),
        }
    }

    /// The on-disk key for this condition.
    pub fn key(&self) -> &str {
        match self {
            Condition::MinTrustScore(_) => "minTrustScore",
            Condition::MinStakedTokens(_) => "minStakedTokens",
            Condition::MinCompletedDreams(_) => "minCompletedDreams",
            Condition::RequiredBadges(_) => "requiredBadges",
            Condition::Unrecognized { key, .. } => key,
        }
    }

    fn threshold(&self) -> Value {
        match self {
            Condition::MinTrustScore(n) | Condition::MinStakedTokens(n) => Value::from(*n),
            Condition::MinCompletedDreams(n) => Value::from(*n),
            Condition::RequiredBadges(badges) => Value::from(badges.clone()),
            Condition::Unrecognized { threshold, .. } => threshold.clone(),
        }
    }

    /// Evaluate the condition against an actor snapshot.
    pub fn is_met_by(&self, actor: &ActorContext) -> bool {
        match self {
            Condition::MinTrustScore(min) => actor.trust_score.unwrap_or(0.0) >= *min,
            Condition::MinStakedTokens(min) => actor.staked_tokens.unwrap_or(0.0) >= *min,
            Condition::MinCompletedDreams(min) => actor.completed_dreams.unwrap_or(0) >= *min,
            Condition::RequiredBadges(required) => {
                required.iter().all(|badge| actor.badges.contains(badge))
            }
            Condition::Unrecognized { .. } => false,
        }
    }
}

/// The conditions of one rule. All must hold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self(conditions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first condition the actor fails, if any. Stops at the first failure.
    pub fn first_unmet(&self, actor: &ActorContext) -> Option<&Condition> {
        self.0.iter().find(|c| !c.is_met_by(actor))
    }

    /// True when every condition holds for the actor.
    pub fn all_met(&self, actor: &ActorContext) -> bool {
        self.first_unmet(actor).is_none()
    }
}

impl TryFrom<BTreeMap<String, Value>> for Conditions {
    type Error = String;

    fn try_from(map: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        map.iter()
            .map(|(key, threshold)| Condition::from_entry(key, threshold))
            .collect::<Result<Vec<_>, _>>()
            .map(Conditions)
    }
}

impl From<Conditions> for BTreeMap<String, Value> {
    fn from(conditions: Conditions) -> Self {
        conditions
            .0
            .iter()
            .map(|c| (c.key().to_string(), c.threshold()))
            .collect()
    }
}
