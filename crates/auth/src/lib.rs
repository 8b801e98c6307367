//! `warden-auth`: hierarchical authorization rule engine.
//!
//! Rules are attached to dot-separated specifiers (`"model.read"`) and kept in
//! an in-memory prefix tree. Decisions walk that tree for a principal's roles
//! and identity. This crate is decoupled from HTTP and storage.

pub mod authorize;
pub mod gate;
pub mod library;
pub mod principal;
pub mod record;
pub mod roles;
pub mod rule;
pub mod tree;

pub use authorize::{AuthzError, Decision, Precedence, RuleMatch};
pub use gate::{AuthorizationGate, Policy};
pub use library::{NodeListing, RuleLibrary};
pub use principal::{Principal, PrincipalId};
pub use record::{RuleDraft, RuleRecord, SpecifierEntity};
pub use roles::Role;
pub use rule::{Polarity, Rule, Scope};
pub use tree::{Node, NodeRules, RuleSet, Subject, ValueLists};
