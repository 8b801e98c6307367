use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::Specifier;

use crate::rule::{Polarity, Scope};
use crate::tree::{Node, NodeRules, Subject};
use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: not authorized for {0}")]
    Forbidden(String),

    #[error("forbidden: missing role, one of {0:?} required")]
    MissingRole(Vec<String>),

    #[error("policy requires at least one {0}")]
    EmptyPolicy(&'static str),
}

/// Which polarity wins when a node matches the principal both ways.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// A denying match beats a granting one (default).
    #[default]
    NegativeFirst,
    /// A granting match beats a denying one.
    PositiveFirst,
}

impl Precedence {
    pub fn from_prioritise_positive(prioritise_positive_rules: bool) -> Self {
        if prioritise_positive_rules {
            Precedence::PositiveFirst
        } else {
            Precedence::NegativeFirst
        }
    }

    /// Polarities in evaluation order.
    pub fn order(self) -> [Polarity; 2] {
        match self {
            Precedence::NegativeFirst => [Polarity::Negative, Polarity::Positive],
            Precedence::PositiveFirst => [Polarity::Positive, Polarity::Negative],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision (audit trail)
// ─────────────────────────────────────────────────────────────────────────────

/// The rule value that decided an authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    /// Specifier of the deciding node.
    pub node: Specifier,
    /// Depth of the deciding node (0 = root).
    pub depth: usize,
    pub polarity: Polarity,
    pub scope: Scope,
    pub subject: Subject,
}

/// Outcome of an authorization request with the reason it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub specifier: Specifier,
    pub allowed: bool,
    pub precedence: Precedence,
    /// `None` when no rule on the path matched the principal.
    pub matched: Option<RuleMatch>,
    pub reason: String,
}

/// Resolve a decision against a tree.
///
/// Scans the resolved path deepest-first. The requested node itself is
/// evaluated on both of its scopes, ancestors on their propagated values only.
/// The first node matching the principal decides according to `precedence`;
/// values are never merged across levels. No match anywhere allows.
///
/// - No IO
/// - No panics
pub(crate) fn resolve(
    root: &Node,
    principal: &Principal,
    specifier: &Specifier,
    precedence: Precedence,
) -> Decision {
    let path = root.find_path(specifier);
    let target_depth = specifier.depth();

    for (depth, node) in path.iter().enumerate().rev() {
        let Some(rules) = node.rules() else {
            continue;
        };
        let scopes: &[Scope] = if depth == target_depth {
            &[Scope::Exact, Scope::Propagated]
        } else {
            &[Scope::Propagated]
        };

        if let Some((polarity, scope, subject)) = evaluate(rules, scopes, principal, precedence) {
            let node_spec = specifier.prefix(depth);
            let allowed = polarity.is_positive();
            let reason = format!(
                "{} by {} rule for {} at {} ({:?} values)",
                if allowed { "allowed" } else { "denied" },
                polarity.list_name(),
                subject,
                node_spec,
                scope,
            );
            return Decision {
                specifier: specifier.clone(),
                allowed,
                precedence,
                matched: Some(RuleMatch {
                    node: node_spec,
                    depth,
                    polarity,
                    scope,
                    subject,
                }),
                reason,
            };
        }
    }

    Decision {
        specifier: specifier.clone(),
        allowed: true,
        precedence,
        matched: None,
        reason: "allowed: no rule on the path matches the principal (default allow)".to_string(),
    }
}

fn evaluate(
    rules: &NodeRules,
    scopes: &[Scope],
    principal: &Principal,
    precedence: Precedence,
) -> Option<(Polarity, Scope, Subject)> {
    for polarity in precedence.order() {
        for &scope in scopes {
            if let Some(subject) = rules.scope(scope).matching_subject(principal, polarity) {
                return Some((polarity, scope, subject));
            }
        }
    }
    None
}
