//! Persisted representation of rules and specifiers.
//!
//! These are plain data: validation, specifier resolution and the lifecycle
//! hooks that feed the [`RuleLibrary`](crate::RuleLibrary) live with the
//! storage glue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{Entity, RuleId, Specifier, SpecifierId};

use crate::{PrincipalId, Role, Rule};

/// A persisted specifier, unique by its `specifier` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecifierEntity {
    pub id: SpecifierId,
    pub specifier: Specifier,
}

impl Entity for SpecifierEntity {
    type Id = SpecifierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Caller input for creating or editing a rule record.
///
/// The specifier may be named by reference (`specifier_id`), by literal
/// string (`specifier`), or both, in which case they must agree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    #[serde(default)]
    pub specifier_id: Option<SpecifierId>,
    #[serde(default, rename = "spec")]
    pub specifier: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub principal_id: Option<PrincipalId>,
    pub positive: bool,
    #[serde(default)]
    pub propagates: Option<bool>,
}

impl RuleDraft {
    /// Draft naming its specifier by literal string.
    pub fn for_spec(specifier: impl Into<String>, positive: bool) -> Self {
        Self {
            specifier: Some(specifier.into()),
            positive,
            ..Self::default()
        }
    }

    /// Draft naming its specifier by reference.
    pub fn for_specifier_id(specifier_id: SpecifierId, positive: bool) -> Self {
        Self {
            specifier_id: Some(specifier_id),
            positive,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_principal(mut self, principal_id: PrincipalId) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    pub fn with_propagates(mut self, propagates: bool) -> Self {
        self.propagates = Some(propagates);
        self
    }
}

/// A validated, persisted rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub id: RuleId,
    pub specifier_id: SpecifierId,
    pub role: Option<Role>,
    pub principal_id: Option<PrincipalId>,
    pub positive: bool,
    pub propagates: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for RuleRecord {
    type Id = RuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl RuleRecord {
    /// The tree-level rule this record stands for, given its resolved specifier.
    pub fn to_rule(&self, specifier: Specifier) -> Rule {
        Rule {
            specifier,
            role: self.role.clone(),
            principal_id: self.principal_id,
            positive: self.positive,
            propagates: self.propagates,
        }
    }

    /// Whether `other` writes the same values into the same place.
    pub fn same_effect(&self, other: &RuleRecord) -> bool {
        self.specifier_id == other.specifier_id
            && self.role == other.role
            && self.principal_id == other.principal_id
            && self.positive == other.positive
            && self.propagates.unwrap_or(self.positive) == other.propagates.unwrap_or(other.positive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_reads_declaration_field_names() {
        let principal_id = PrincipalId::new();
        let raw = format!(
            r#"{{ "spec": "model.read", "principalId": "{principal_id}", "positive": false, "propagates": true }}"#
        );
        let draft: RuleDraft = serde_json::from_str(&raw).unwrap();

        assert_eq!(
            draft,
            RuleDraft::for_spec("model.read", false)
                .with_principal(principal_id)
                .with_propagates(true)
        );
    }

    #[test]
    fn same_effect_compares_effective_propagation() {
        let now = Utc::now();
        let record = RuleRecord {
            id: RuleId::new(),
            specifier_id: SpecifierId::new(),
            role: Some(Role::new("reader")),
            principal_id: None,
            positive: true,
            propagates: None,
            created_at: now,
            updated_at: now,
        };

        let explicit = RuleRecord {
            id: RuleId::new(),
            propagates: Some(true),
            ..record.clone()
        };
        assert!(record.same_effect(&explicit));

        let exact = RuleRecord {
            propagates: Some(false),
            ..record.clone()
        };
        assert!(!record.same_effect(&exact));
    }

    #[test]
    fn record_maps_to_rule() {
        let now = Utc::now();
        let record = RuleRecord {
            id: RuleId::new(),
            specifier_id: SpecifierId::new(),
            role: Some(Role::new("reader")),
            principal_id: None,
            positive: false,
            propagates: None,
            created_at: now,
            updated_at: now,
        };
        let specifier = Specifier::parse("model.write").unwrap();

        let rule = record.to_rule(specifier.clone());
        assert_eq!(rule, Rule::deny(specifier).for_role("reader"));
        assert!(!rule.effective_propagates());
    }
}
