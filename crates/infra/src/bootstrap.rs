//! Startup: rebuild the tree from persisted records, or seed the store from
//! configuration on first boot.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use warden_auth::RuleRecord;
use warden_core::{Specifier, SpecifierId};

use crate::config::AuthConfig;
use crate::repository::{RepositoryError, RuleRepository};
use crate::store::{RuleFilter, RuleRecordStore, SpecifierStore};

/// What a bootstrap run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Persisted records written back into the tree.
    pub replayed: usize,
    /// Records created from seed declarations.
    pub seeded: usize,
    /// Records or declarations that could not be applied.
    pub skipped: usize,
}

/// Load the rule tree.
///
/// When the record store holds anything, every record is replayed in
/// storage order under a single tree lock and the seed rules are ignored.
/// Otherwise each seed declaration goes through the repository like any
/// other rule; malformed ones are logged and skipped. Store failures abort.
pub fn bootstrap<S, R>(
    repository: &RuleRepository<S, R>,
    config: &AuthConfig,
) -> Result<BootstrapReport, RepositoryError>
where
    S: SpecifierStore,
    R: RuleRecordStore,
{
    let records = repository.list(&RuleFilter::all())?;
    let report = if records.is_empty() {
        seed(repository, config)?
    } else {
        replay(repository, &records)?
    };

    info!(
        replayed = report.replayed,
        seeded = report.seeded,
        skipped = report.skipped,
        "auth rules bootstrapped"
    );
    repository.library().log_tree();
    Ok(report)
}

fn replay<S, R>(
    repository: &RuleRepository<S, R>,
    records: &[RuleRecord],
) -> Result<BootstrapReport, RepositoryError>
where
    S: SpecifierStore,
    R: RuleRecordStore,
{
    let mut report = BootstrapReport::default();
    let specifiers: HashMap<SpecifierId, Specifier> = repository
        .specifiers()
        .list()?
        .into_iter()
        .map(|entity| (entity.id, entity.specifier))
        .collect();
    let mut rules = Vec::with_capacity(records.len());

    for record in records {
        let Some(specifier) = specifiers.get(&record.specifier_id) else {
            warn!(
                rule_id = %record.id,
                specifier_id = %record.specifier_id,
                "skipping rule with a dangling specifier reference"
            );
            report.skipped += 1;
            continue;
        };
        rules.push(record.to_rule(specifier.clone()));
    }

    report.replayed = repository.library().add_rules(&rules);
    Ok(report)
}

fn seed<S, R>(
    repository: &RuleRepository<S, R>,
    config: &AuthConfig,
) -> Result<BootstrapReport, RepositoryError>
where
    S: SpecifierStore,
    R: RuleRecordStore,
{
    let mut report = BootstrapReport::default();

    for declaration in config.rules.normalize() {
        let draft = match declaration {
            Ok(draft) => draft,
            Err(err) => {
                warn!(error = %err, "skipping malformed seed rule");
                report.skipped += 1;
                continue;
            }
        };

        match repository.create(draft) {
            Ok(_) => report.seeded += 1,
            Err(RepositoryError::Validation(err)) => {
                warn!(error = %err, "skipping invalid seed rule");
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(report)
}
