//! Rules as the specifier tree sees them.

use serde::{Deserialize, Serialize};

use warden_core::Specifier;

use crate::{PrincipalId, Role};

/// Which list a rule value belongs to: granting (`pos`) or denying (`neg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn from_positive(positive: bool) -> Self {
        if positive {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Polarity::Positive)
    }

    /// Short list name used in diagnostics (`pos` / `neg`).
    pub fn list_name(self) -> &'static str {
        match self {
            Polarity::Positive => "pos",
            Polarity::Negative => "neg",
        }
    }
}

/// Where a rule value is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Written into every node along the path; visible at those nodes and
    /// everything below them.
    Propagated,
    /// Written into the named node only; visible when exactly that specifier
    /// is requested.
    Exact,
}

/// One authorization rule: a subject (role and/or principal), a polarity and
/// a propagation flag, attached to a specifier.
///
/// `role` and `principal_id` are independent values; a rule carrying both
/// writes both. A rule carrying neither is inert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub specifier: Specifier,
    pub role: Option<Role>,
    pub principal_id: Option<PrincipalId>,
    pub positive: bool,
    pub propagates: Option<bool>,
}

impl Rule {
    /// A granting rule on `specifier` (no subject yet).
    pub fn allow(specifier: Specifier) -> Self {
        Self {
            specifier,
            role: None,
            principal_id: None,
            positive: true,
            propagates: None,
        }
    }

    /// A denying rule on `specifier` (no subject yet).
    pub fn deny(specifier: Specifier) -> Self {
        Self {
            positive: false,
            ..Self::allow(specifier)
        }
    }

    pub fn for_role(mut self, role: impl Into<Role>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn for_principal(mut self, principal_id: PrincipalId) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    pub fn propagating(mut self, propagates: bool) -> Self {
        self.propagates = Some(propagates);
        self
    }

    pub fn polarity(&self) -> Polarity {
        Polarity::from_positive(self.positive)
    }

    /// Effective propagation: an explicit flag wins, otherwise granting rules
    /// propagate and denying rules stay on their own node.
    pub fn effective_propagates(&self) -> bool {
        self.propagates.unwrap_or(self.positive)
    }

    pub fn scope(&self) -> Scope {
        if self.effective_propagates() {
            Scope::Propagated
        } else {
            Scope::Exact
        }
    }

    pub fn has_subject(&self) -> bool {
        self.role.is_some() || self.principal_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(raw: &str) -> Specifier {
        Specifier::parse(raw).unwrap()
    }

    #[test]
    fn propagation_defaults_to_polarity() {
        assert!(Rule::allow(spec("a")).effective_propagates());
        assert!(!Rule::deny(spec("a")).effective_propagates());
        assert_eq!(Rule::deny(spec("a")).scope(), Scope::Exact);
    }

    #[test]
    fn explicit_propagation_overrides_default() {
        let deny = Rule::deny(spec("a")).propagating(true);
        assert!(deny.effective_propagates());
        let allow = Rule::allow(spec("a")).propagating(false);
        assert_eq!(allow.scope(), Scope::Exact);
    }

    #[test]
    fn subject_requires_role_or_principal() {
        assert!(!Rule::allow(spec("a")).has_subject());
        assert!(Rule::allow(spec("a")).for_role("user").has_subject());
        assert!(Rule::allow(spec("a")).for_principal(PrincipalId::new()).has_subject());
    }
}
