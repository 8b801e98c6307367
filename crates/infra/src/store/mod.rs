//! Persistence boundary for rule records and specifiers.
//!
//! The traits make no storage assumptions; the in-memory implementations
//! stand in for a database in tests/dev.

pub mod principal;
pub mod rule;
pub mod specifier;

pub use principal::{InMemoryPrincipalDirectory, PrincipalDirectory};
pub use rule::{InMemoryRuleRecordStore, RuleFilter, RuleRecordStore};
pub use specifier::{InMemorySpecifierStore, SpecifierStore};

/// Store operation error.
///
/// These are **infrastructure errors**, as opposed to the validation failures
/// raised before a record is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Storage("lock poisoned".to_string())
    }
}
