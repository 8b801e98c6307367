//! Rule library: the process-wide specifier tree plus the operations that
//! mutate and query it.
//!
//! The tree lives behind a reader-writer lock. Every mutation (including a
//! whole bootstrap replay or an update's remove+add pair) runs under a single
//! write-lock acquisition; decisions and listings share read access. Nothing
//! inside the lock performs IO.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use warden_core::Specifier;

use crate::authorize::{Decision, Precedence, resolve};
use crate::rule::{Rule, Scope};
use crate::tree::{Node, NodeRules, RuleValue};
use crate::Principal;

/// One flattened tree node, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeListing {
    pub specifier: Specifier,
    pub rules: Option<NodeRules>,
    pub children: Vec<String>,
}

/// In-memory rule engine.
///
/// Construct one per process and share it (`Arc<RuleLibrary>`) with the
/// persistence hooks and the authorization gate.
#[derive(Debug, Default)]
pub struct RuleLibrary {
    root: RwLock<Node>,
    precedence: Precedence,
}

impl RuleLibrary {
    pub fn new(precedence: Precedence) -> Self {
        Self {
            root: RwLock::new(Node::new()),
            precedence,
        }
    }

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    // Tree edits never panic half-way, so a poisoned lock still guards a
    // consistent tree.
    fn read(&self) -> RwLockReadGuard<'_, Node> {
        self.root.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Node> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────

    /// Write a rule's values into the tree.
    ///
    /// Propagating rules are written into every node from the first segment
    /// down to the leaf; others into the leaf only. A rule on the root
    /// specifier writes into the root.
    pub fn add_rule(&self, rule: &Rule) {
        let mut root = self.write();
        apply_add(&mut root, rule);
    }

    /// Add several rules under one lock acquisition (bootstrap replay).
    pub fn add_rules<'a, I>(&self, rules: I) -> usize
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        let mut root = self.write();
        let mut count = 0;
        for rule in rules {
            apply_add(&mut root, rule);
            count += 1;
        }
        count
    }

    /// Remove a rule's values and prune emptied nodes. Removing values that
    /// are not present is a no-op.
    pub fn remove_rule(&self, rule: &Rule) {
        self.remove_rule_retaining(rule, []);
    }

    /// Remove a rule's values, keeping at each node every value one of
    /// `retained` still writes there.
    pub fn remove_rule_retaining<'a, I>(&self, rule: &Rule, retained: I)
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        let retained: Vec<&Rule> = retained.into_iter().collect();
        let mut root = self.write();
        apply_remove(&mut root, rule, &retained);
    }

    /// Replace `old` with `new` atomically with respect to readers.
    pub fn update_rule(&self, old: &Rule, new: &Rule) {
        self.update_rule_retaining(old, new, []);
    }

    /// [`update_rule`](Self::update_rule), keeping the values of `retained`
    /// while `old` is taken out.
    pub fn update_rule_retaining<'a, I>(&self, old: &Rule, new: &Rule, retained: I)
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        let retained: Vec<&Rule> = retained.into_iter().collect();
        let mut root = self.write();
        apply_remove(&mut root, old, &retained);
        apply_add(&mut root, new);
    }

    /// Drop every rule (the root stays).
    pub fn clear(&self) {
        *self.write() = Node::new();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Decide whether `principal` may act on `specifier`.
    ///
    /// Defaults to **allow** when no rule on the path matches. Deployments
    /// wanting deny-by-default must add a propagating negative rule on the
    /// root specifier.
    pub fn authorize(&self, principal: &Principal, specifier: &Specifier) -> bool {
        self.explain(principal, specifier).allowed
    }

    /// Same as [`authorize`](Self::authorize), returning the full decision.
    pub fn explain(&self, principal: &Principal, specifier: &Specifier) -> Decision {
        let decision = {
            let root = self.read();
            resolve(&root, principal, specifier, self.precedence)
        };
        debug!(
            specifier = %specifier,
            allowed = decision.allowed,
            deciding_node = ?decision.matched.as_ref().map(|m| m.node.as_str()),
            "authorization decided"
        );
        decision
    }

    // ─────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────

    /// Rules held by the node of `specifier`; empty when the node is absent.
    pub fn list_auth_rules(&self, specifier: &Specifier) -> NodeRules {
        let root = self.read();
        root.find(specifier)
            .and_then(Node::rules)
            .cloned()
            .unwrap_or_default()
    }

    /// Flatten the tree depth-first in segment order.
    ///
    /// With `include_empty_nodes` the root and intermediate nodes without
    /// rules are listed too.
    pub fn list_nodes(&self, include_empty_nodes: bool) -> Vec<NodeListing> {
        let root = self.read();
        let mut listing = Vec::new();
        let mut stack: Vec<(Specifier, &Node)> = vec![(Specifier::root(), &*root)];

        while let Some((specifier, node)) = stack.pop() {
            if include_empty_nodes || node.rules().is_some() {
                listing.push(NodeListing {
                    specifier: specifier.clone(),
                    rules: node.rules().cloned(),
                    children: node.child_segments(),
                });
            }
            let children: Vec<_> = node.children().collect();
            for (segment, child) in children.into_iter().rev() {
                // Segments originate from validated specifiers.
                let Ok(child_spec) = specifier.child(segment) else {
                    continue;
                };
                stack.push((child_spec, child));
            }
        }

        listing
    }

    /// Rules of each node from the root to `specifier`, as far as the tree
    /// reaches.
    pub fn get_node_path(&self, specifier: &Specifier) -> Vec<Option<NodeRules>> {
        let root = self.read();
        root.find_path(specifier)
            .into_iter()
            .map(|node| node.rules().cloned())
            .collect()
    }

    /// Deep copy of the current tree.
    pub fn snapshot(&self) -> Node {
        self.read().clone()
    }

    /// Dump the flattened tree at debug level.
    pub fn log_tree(&self) {
        for entry in self.list_nodes(true) {
            debug!(
                specifier = %entry.specifier,
                rules = ?entry.rules,
                children = ?entry.children,
                "auth tree node"
            );
        }
    }
}

fn rule_value(rule: &Rule) -> RuleValue<'_> {
    RuleValue {
        role: rule.role.as_ref(),
        principal_id: rule.principal_id,
        polarity: rule.polarity(),
        scope: rule.scope(),
    }
}

fn apply_add(root: &mut Node, rule: &Rule) {
    let value = rule_value(rule);

    if value.scope == Scope::Propagated && !rule.specifier.is_root() {
        let mut node = root;
        for segment in rule.specifier.segments() {
            node = node.child_or_insert(segment);
            node.insert_values(&value);
        }
    } else {
        root.ensure_path(&rule.specifier).insert_values(&value);
    }

    debug!(
        specifier = %rule.specifier,
        role = ?rule.role,
        principal_id = ?rule.principal_id,
        list = value.polarity.list_name(),
        scope = ?value.scope,
        "auth rule added"
    );
}

/// Whether `rule` writes its values into the node at `node`.
fn writes_into(rule: &Rule, node: &Specifier) -> bool {
    if rule.scope() == Scope::Propagated && !rule.specifier.is_root() {
        !node.is_root() && node.covers(&rule.specifier)
    } else {
        rule.specifier == *node
    }
}

/// The part of `rule`'s values at `node` that no retained rule also writes.
fn removable_value<'r>(rule: &'r Rule, node: &Specifier, retained: &[&Rule]) -> RuleValue<'r> {
    let mut value = rule_value(rule);
    let (polarity, scope) = (value.polarity, value.scope);
    let writers = retained
        .iter()
        .filter(|other| other.polarity() == polarity && other.scope() == scope && writes_into(other, node));
    for other in writers {
        if value.role.is_some() && other.role.as_ref() == value.role {
            value.role = None;
        }
        if value.principal_id.is_some() && other.principal_id == value.principal_id {
            value.principal_id = None;
        }
    }
    value
}

fn apply_remove(root: &mut Node, rule: &Rule, retained: &[&Rule]) {
    let value = rule_value(rule);

    if value.scope == Scope::Propagated && !rule.specifier.is_root() {
        let mut node = &mut *root;
        for (depth, segment) in rule.specifier.segments().enumerate() {
            let Some(next) = node.child_mut(segment) else {
                break;
            };
            let here = rule.specifier.prefix(depth + 1);
            next.remove_values(&removable_value(rule, &here, retained));
            node = next;
        }
    } else if let Some(node) = root.find_mut(&rule.specifier) {
        node.remove_values(&removable_value(rule, &rule.specifier, retained));
    }

    let pruned = root.prune(&rule.specifier);
    debug!(
        specifier = %rule.specifier,
        role = ?rule.role,
        principal_id = ?rule.principal_id,
        list = value.polarity.list_name(),
        scope = ?value.scope,
        retained = retained.len(),
        pruned,
        "auth rule removed"
    );
}
