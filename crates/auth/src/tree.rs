//! Specifier tree: one node per dot-path segment, each holding the rule
//! values aggregated at that point of the namespace.
//!
//! Nodes are owned exclusively by their parent. All walks are iterative and
//! bounded by the depth of the specifier involved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use warden_core::Specifier;

use crate::rule::{Polarity, Scope};
use crate::{Principal, PrincipalId, Role};

// ─────────────────────────────────────────────────────────────────────────────
// Value lists
// ─────────────────────────────────────────────────────────────────────────────

/// Granting and denying values of one subject kind.
///
/// Each list has set semantics (no duplicates) and keeps insertion order for
/// deterministic listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueLists<T> {
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub pos: Vec<T>,
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub neg: Vec<T>,
}

impl<T> Default for ValueLists<T> {
    fn default() -> Self {
        Self {
            pos: Vec::new(),
            neg: Vec::new(),
        }
    }
}

impl<T: PartialEq> ValueLists<T> {
    pub fn list(&self, polarity: Polarity) -> &[T] {
        match polarity {
            Polarity::Positive => &self.pos,
            Polarity::Negative => &self.neg,
        }
    }

    fn list_mut(&mut self, polarity: Polarity) -> &mut Vec<T> {
        match polarity {
            Polarity::Positive => &mut self.pos,
            Polarity::Negative => &mut self.neg,
        }
    }

    /// Insert unless already present. Returns whether the list changed.
    pub fn insert(&mut self, polarity: Polarity, value: T) -> bool {
        let list = self.list_mut(polarity);
        if list.contains(&value) {
            return false;
        }
        list.push(value);
        true
    }

    /// Remove if present. Returns whether the list changed.
    pub fn remove(&mut self, polarity: Polarity, value: &T) -> bool {
        let list = self.list_mut(polarity);
        match list.iter().position(|v| v == value) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, polarity: Polarity, value: &T) -> bool {
        self.list(polarity).contains(value)
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty() && self.neg.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule sets
// ─────────────────────────────────────────────────────────────────────────────

/// The subject that made a rule set match a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Subject {
    Role(Role),
    Principal(PrincipalId),
}

impl core::fmt::Display for Subject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Subject::Role(role) => write!(f, "role '{role}'"),
            Subject::Principal(id) => write!(f, "principal {id}"),
        }
    }
}

/// Role and principal values of one scope at one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default, skip_serializing_if = "ValueLists::is_empty")]
    pub role: ValueLists<Role>,
    #[serde(default, skip_serializing_if = "ValueLists::is_empty")]
    pub principal_id: ValueLists<PrincipalId>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.role.is_empty() && self.principal_id.is_empty()
    }

    fn insert(&mut self, values: &RuleValue<'_>) -> bool {
        let mut changed = false;
        if let Some(role) = values.role {
            changed |= self.role.insert(values.polarity, role.clone());
        }
        if let Some(id) = values.principal_id {
            changed |= self.principal_id.insert(values.polarity, id);
        }
        changed
    }

    fn remove(&mut self, values: &RuleValue<'_>) -> bool {
        let mut changed = false;
        if let Some(role) = values.role {
            changed |= self.role.remove(values.polarity, role);
        }
        if let Some(id) = values.principal_id {
            changed |= self.principal_id.remove(values.polarity, &id);
        }
        changed
    }

    /// First subject of `principal` listed under `polarity`: roles in the
    /// principal's order, then its identity.
    pub fn matching_subject(&self, principal: &Principal, polarity: Polarity) -> Option<Subject> {
        if let Some(role) = principal
            .roles
            .iter()
            .find(|role| self.role.contains(polarity, role))
        {
            return Some(Subject::Role(role.clone()));
        }
        principal
            .principal_id
            .filter(|id| self.principal_id.contains(polarity, id))
            .map(Subject::Principal)
    }
}

/// Rule values held by one node, split by visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRules {
    /// Values of propagating rules: visible here and below.
    #[serde(default, skip_serializing_if = "RuleSet::is_empty")]
    pub propagated: RuleSet,
    /// Values of non-propagating rules declared on exactly this node.
    #[serde(default, skip_serializing_if = "RuleSet::is_empty")]
    pub exact: RuleSet,
}

impl NodeRules {
    pub fn is_empty(&self) -> bool {
        self.propagated.is_empty() && self.exact.is_empty()
    }

    pub fn scope(&self, scope: Scope) -> &RuleSet {
        match scope {
            Scope::Propagated => &self.propagated,
            Scope::Exact => &self.exact,
        }
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut RuleSet {
        match scope {
            Scope::Propagated => &mut self.propagated,
            Scope::Exact => &mut self.exact,
        }
    }
}

/// Borrowed view of the values one rule writes into a node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RuleValue<'a> {
    pub role: Option<&'a Role>,
    pub principal_id: Option<PrincipalId>,
    pub polarity: Polarity,
    pub scope: Scope,
}

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

/// A tree node keyed by its path segment in the parent's `children`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<String, Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rules: Option<NodeRules>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> Option<&NodeRules> {
        self.rules.as_ref()
    }

    pub fn child(&self, segment: &str) -> Option<&Node> {
        self.children.get(segment)
    }

    /// Children in segment order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(segment, node)| (segment.as_str(), node))
    }

    pub fn child_segments(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    /// A node without rules and without children is dead weight.
    pub fn is_empty(&self) -> bool {
        self.rules.is_none() && self.children.is_empty()
    }

    /// Number of nodes in this subtree, this node included.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.values());
        }
        count
    }

    /// Terminal node of `specifier`, creating missing nodes along the way.
    /// The root specifier yields this node.
    pub fn ensure_path(&mut self, specifier: &Specifier) -> &mut Node {
        let mut node = self;
        for segment in specifier.segments() {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node
    }

    /// Nodes from this one (included) down towards `specifier`, stopping at
    /// the first missing segment. Never creates nodes.
    pub fn find_path(&self, specifier: &Specifier) -> Vec<&Node> {
        let mut path = Vec::with_capacity(specifier.depth() + 1);
        let mut node = self;
        path.push(node);
        for segment in specifier.segments() {
            match node.children.get(segment) {
                Some(next) => {
                    path.push(next);
                    node = next;
                }
                None => break,
            }
        }
        path
    }

    pub fn find(&self, specifier: &Specifier) -> Option<&Node> {
        let mut node = self;
        for segment in specifier.segments() {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    pub(crate) fn find_mut(&mut self, specifier: &Specifier) -> Option<&mut Node> {
        let mut node = self;
        for segment in specifier.segments() {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    pub(crate) fn child_mut(&mut self, segment: &str) -> Option<&mut Node> {
        self.children.get_mut(segment)
    }

    pub(crate) fn child_or_insert(&mut self, segment: &str) -> &mut Node {
        self.children.entry(segment.to_string()).or_default()
    }

    fn find_segments_mut(&mut self, segments: &[&str]) -> Option<&mut Node> {
        let mut node = self;
        for segment in segments {
            node = node.children.get_mut(*segment)?;
        }
        Some(node)
    }

    /// Detach empty nodes on the way from `specifier`'s leaf up to (but not
    /// including) this node. Stops at the first node that still carries rules
    /// or children. Returns the number of detached nodes.
    pub fn prune(&mut self, specifier: &Specifier) -> usize {
        let segments: Vec<&str> = specifier.segments().collect();
        let mut removed = 0;

        for depth in (1..=segments.len()).rev() {
            let segment = segments[depth - 1];
            let Some(parent) = self.find_segments_mut(&segments[..depth - 1]) else {
                // Missing ancestors: nothing to detach at this level.
                continue;
            };
            match parent.children.get(segment).map(Node::is_empty) {
                Some(true) => {
                    parent.children.remove(segment);
                    removed += 1;
                }
                Some(false) => break,
                None => continue,
            }
        }

        removed
    }

    pub(crate) fn insert_values(&mut self, values: &RuleValue<'_>) -> bool {
        self.rules
            .get_or_insert_with(NodeRules::default)
            .scope_mut(values.scope)
            .insert(values)
    }

    /// Remove values; clears the node's rules entirely once both scopes are
    /// empty. Removing absent values is a no-op.
    pub(crate) fn remove_values(&mut self, values: &RuleValue<'_>) -> bool {
        let Some(rules) = self.rules.as_mut() else {
            return false;
        };
        let changed = rules.scope_mut(values.scope).remove(values);
        if rules.is_empty() {
            self.rules = None;
        }
        changed
    }
}
