//! Infrastructure layer: rule persistence, lifecycle hooks, configuration
//! and startup.

pub mod bootstrap;
pub mod config;
pub mod repository;
pub mod store;

pub use bootstrap::{BootstrapReport, bootstrap};
pub use config::{AuthConfig, ConfigError, SeedEntry, SeedError, SeedRule, SeedRules, SpecEntries};
pub use repository::{RepositoryError, RuleRepository, ValidationError};
pub use store::{
    InMemoryPrincipalDirectory, InMemoryRuleRecordStore, InMemorySpecifierStore, PrincipalDirectory,
    RuleFilter, RuleRecordStore, SpecifierStore, StoreError,
};

/// Repository over the in-memory stores.
pub type InMemoryRuleRepository =
    RuleRepository<std::sync::Arc<InMemorySpecifierStore>, std::sync::Arc<InMemoryRuleRecordStore>>;
