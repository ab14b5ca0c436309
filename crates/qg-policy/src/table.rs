// table.rs — The ordered, versioned rule table.
//
// Resolution is first-match-wins by table order. There is no priority
// field; a wildcard `system` rule placed before an actor-specific rule for
// the same capability and scope hides it. `shadowed_rules()` reports such
// rules so authors see them at load time.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::actor::ActorType;
use crate::error::PolicyError;
use crate::rule::{Capability, PolicyRule, QuorumKind, Scope};

/// Version string of the built-in fallback table.
pub const FALLBACK_VERSION: &str = "fallback-1";

/// Serialization format of a rule table source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Yaml,
    Json,
}

impl TableFormat {
    /// JSON for `.json` files, YAML for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TableFormat::Json,
            _ => TableFormat::Yaml,
        }
    }
}

/// A rule that can never be selected because an earlier rule always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowedRule {
    pub index: usize,
    pub shadowed_by: usize,
}

/// A versioned, ordered list of policy rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyTable {
    pub version: String,
    pub rules: Vec<PolicyRule>,
}

impl PolicyTable {
    pub fn new(version: impl Into<String>, rules: Vec<PolicyRule>) -> Self {
        Self {
            version: version.into(),
            rules,
        }
    }

    /// The built-in conservative table used when no valid source is available.
    ///
    /// Wallets may publish and remix dreams freely (both reversible). Every
    /// admin infrastructure, key and payout action needs two approvals.
    pub fn fallback() -> Self {
        use ActorType::{Admin, Wallet};
        use Capability::*;
        use QuorumKind as Q;

        Self::new(
            FALLBACK_VERSION,
            vec![
                PolicyRule::new(Wallet, Publish, Scope::Dream, true),
                PolicyRule::new(Wallet, Remix, Scope::Dream, true),
                PolicyRule::new(Admin, Deploy, Scope::Infrastructure, false)
                    .with_quorum([Q::Tech, Q::Safety])
                    .with_min_approvals(2),
                PolicyRule::new(Admin, ModifySchema, Scope::Infrastructure, false)
                    .with_quorum([Q::Tech, Q::Admin])
                    .with_min_approvals(2),
                PolicyRule::new(Admin, ManageKeys, Scope::Infrastructure, false)
                    .with_quorum([Q::Admin, Q::Safety])
                    .with_min_approvals(2),
                PolicyRule::new(Admin, Payout, Scope::Token, false)
                    .with_quorum([Q::Creator, Q::Admin])
                    .with_min_approvals(2),
            ],
        )
    }

    /// Parse and validate a table. Any failure is returned to the caller.
    pub fn parse_strict(content: &str, format: TableFormat) -> Result<Self, PolicyError> {
        let table: PolicyTable = match format {
            TableFormat::Yaml => serde_yaml::from_str(content)?,
            TableFormat::Json => serde_json::from_str(content)?,
        };
        table.validate()?;
        Ok(table)
    }

    /// Schema checks the types alone cannot express.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.version.trim().is_empty() {
            return Err(PolicyError::InvalidTable {
                reason: "version must not be empty".to_string(),
            });
        }
        for (i, rule) in self.rules.iter().enumerate() {
            let mut seen = HashSet::new();
            if let Some(dup) = rule.review_quorum.iter().find(|k| !seen.insert(**k)) {
                return Err(PolicyError::InvalidTable {
                    reason: format!("rule {} lists quorum kind '{}' more than once", i, dup),
                });
            }
            if !rule.review_quorum.is_empty() && rule.min_approvals == Some(0) {
                return Err(PolicyError::InvalidTable {
                    reason: format!("rule {} needs a quorum but sets minApprovals to 0", i),
                });
            }
        }
        Ok(())
    }

    /// First rule matching the request, in table order.
    pub fn find_matching_rule(
        &self,
        actor_type: ActorType,
        capability: Capability,
        scope: Scope,
    ) -> Option<&PolicyRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(actor_type, capability, scope))
    }

    /// Rules hidden by an earlier rule for the same capability and scope.
    pub fn shadowed_rules(&self) -> Vec<ShadowedRule> {
        let mut shadowed = Vec::new();
        for (index, later) in self.rules.iter().enumerate() {
            let winner = self.rules[..index].iter().position(|earlier| {
                earlier.capability == later.capability
                    && earlier.scope == later.scope
                    && (earlier.actor == later.actor || earlier.actor == ActorType::System)
            });
            if let Some(shadowed_by) = winner {
                shadowed.push(ShadowedRule { index, shadowed_by });
            }
        }
        shadowed
    }

    pub fn is_fallback(&self) -> bool {
        self.version == FALLBACK_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "2024.06"
rules:
  - actor: wallet
    capability: monetize
    scope: dream
    reversible: true
    conditions:
      minTrustScore: 0.6
  - actor: system
    capability: archive
    scope: dream
    reversible: true
  - actor: agent
    capability: archive
    scope: dream
    reversible: false
    reviewQuorum: [safety]
"#;

    #[test]
    fn parses_camel_case_yaml() {
        let table = PolicyTable::parse_strict(SAMPLE, TableFormat::Yaml).unwrap();
        assert_eq!(table.version, "2024.06");
        assert_eq!(table.rules.len(), 3);
        assert!(table.rules[0].conditions.is_some());
        assert_eq!(table.rules[2].review_quorum, vec![QuorumKind::Safety]);
    }

    #[test]
    fn parses_json_tables() {
        let json = r#"{"version":"1","rules":[{"actor":"admin","capability":"manage_keys",
            "scope":"infrastructure","reversible":false,"reviewQuorum":["admin","safety"],
            "minApprovals":2}]}"#;
        let table = PolicyTable::parse_strict(json, TableFormat::Json).unwrap();
        assert_eq!(table.rules[0].capability, Capability::ManageKeys);
        assert_eq!(table.rules[0].min_approvals(), 2);
    }

    #[test]
    fn first_match_wins_over_more_specific_later_rule() {
        let table = PolicyTable::parse_strict(SAMPLE, TableFormat::Yaml).unwrap();
        let rule = table
            .find_matching_rule(ActorType::Agent, Capability::Archive, Scope::Dream)
            .unwrap();
        assert_eq!(rule.actor, ActorType::System);
        assert!(!rule.requires_quorum());
    }

    #[test]
    fn no_rule_for_unlisted_combination() {
        let table = PolicyTable::parse_strict(SAMPLE, TableFormat::Yaml).unwrap();
        assert!(table
            .find_matching_rule(ActorType::Agent, Capability::Monetize, Scope::Dream)
            .is_none());
    }

    #[test]
    fn shadowed_rules_are_reported() {
        let table = PolicyTable::parse_strict(SAMPLE, TableFormat::Yaml).unwrap();
        assert_eq!(
            table.shadowed_rules(),
            vec![ShadowedRule {
                index: 2,
                shadowed_by: 1
            }]
        );
        assert!(PolicyTable::fallback().shadowed_rules().is_empty());
    }

    #[test]
    fn unknown_enum_values_fail_validation() {
        let yaml = "version: '1'\nrules:\n  - actor: wallet\n    capability: mint\n    scope: dream\n    reversible: true\n";
        assert!(matches!(
            PolicyTable::parse_strict(yaml, TableFormat::Yaml),
            Err(PolicyError::Yaml(_))
        ));
    }

    #[test]
    fn empty_version_and_duplicate_kinds_are_rejected() {
        let empty_version = PolicyTable::new(" ", vec![]);
        assert!(matches!(
            empty_version.validate(),
            Err(PolicyError::InvalidTable { .. })
        ));

        let dup = PolicyTable::new(
            "1",
            vec![
                PolicyRule::new(ActorType::Admin, Capability::Deploy, Scope::Global, false)
                    .with_quorum([QuorumKind::Tech, QuorumKind::Tech]),
            ],
        );
        assert!(matches!(dup.validate(), Err(PolicyError::InvalidTable { .. })));

        let zero = PolicyTable::new(
            "1",
            vec![
                PolicyRule::new(ActorType::Admin, Capability::Payout, Scope::Token, false)
                    .with_quorum([QuorumKind::Admin])
                    .with_min_approvals(0),
            ],
        );
        assert!(matches!(zero.validate(), Err(PolicyError::InvalidTable { .. })));

        let no_quorum = PolicyTable::new(
            "1",
            vec![PolicyRule::new(ActorType::Wallet, Capability::Publish, Scope::Dream, true)
                .with_min_approvals(0)],
        );
        assert!(no_quorum.validate().is_ok());
    }

    #[test]
    fn fallback_is_conservative() {
        let table = PolicyTable::fallback();
        assert!(table.validate().is_ok());
        assert!(table.is_fallback());

        let publish = table
            .find_matching_rule(ActorType::Wallet, Capability::Publish, Scope::Dream)
            .unwrap();
        assert!(publish.is_reversible());
        assert!(!publish.requires_quorum());

        for (capability, scope) in [
            (Capability::Deploy, Scope::Infrastructure),
            (Capability::ModifySchema, Scope::Infrastructure),
            (Capability::ManageKeys, Scope::Infrastructure),
            (Capability::Payout, Scope::Token),
        ] {
            let rule = table
                .find_matching_rule(ActorType::Admin, capability, scope)
                .unwrap();
            assert!(rule.requires_quorum());
            assert!(!rule.is_reversible());
            assert_eq!(rule.min_approvals, Some(2));
        }
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(TableFormat::from_path(Path::new("p.json")), TableFormat::Json);
        assert_eq!(TableFormat::from_path(Path::new("p.yaml")), TableFormat::Yaml);
        assert_eq!(TableFormat::from_path(Path::new("policy")), TableFormat::Yaml);
    }
}
