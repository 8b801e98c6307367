//! Rule record lifecycle.
//!
//! [`RuleRepository`] is the only writer of rule records. It validates a
//! draft, persists it, then mirrors the change into the shared
//! [`RuleLibrary`] so the tree always reflects the store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use warden_auth::{PrincipalId, Rule, RuleDraft, RuleLibrary, RuleRecord, SpecifierEntity};
use warden_core::{DomainError, RuleId, Specifier, SpecifierId};

use crate::store::{PrincipalDirectory, RuleFilter, RuleRecordStore, SpecifierStore, StoreError};

/// A draft that cannot become a rule record. Raised before anything is
/// persisted or the tree is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rule names neither a specifier reference nor a specifier")]
    MissingSpecifier,
    #[error("unknown specifier reference {0}")]
    UnknownSpecifier(SpecifierId),
    #[error("specifier reference {id} is '{stored}', not '{given}'")]
    SpecifierMismatch {
        id: SpecifierId,
        stored: String,
        given: String,
    },
    #[error("unknown principal {0}")]
    UnknownPrincipal(PrincipalId),
    #[error("rule names neither a role nor a principal")]
    MissingSubject,
    #[error(transparent)]
    InvalidSpecifier(#[from] DomainError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("rule not found: {0}")]
    RuleNotFound(RuleId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The specifier a draft resolved to, and whether resolving created it.
struct ResolvedSpecifier {
    entity: SpecifierEntity,
    created: bool,
}

/// Rule record lifecycle over a specifier store, a record store and the
/// shared library.
///
/// Lifecycle operations are serialized by an internal mutex, so store I/O
/// never interleaves between two writers. The library's own lock is held
/// only for the in-memory step that follows a successful write.
pub struct RuleRepository<S, R> {
    specifiers: S,
    records: R,
    principals: Option<Arc<dyn PrincipalDirectory>>,
    library: Arc<RuleLibrary>,
    lifecycle: Mutex<()>,
}

impl<S, R> RuleRepository<S, R>
where
    S: SpecifierStore,
    R: RuleRecordStore,
{
    pub fn new(specifiers: S, records: R, library: Arc<RuleLibrary>) -> Self {
        Self {
            specifiers,
            records,
            principals: None,
            library,
            lifecycle: Mutex::new(()),
        }
    }

    /// Check principal references against `directory`. Without one, any
    /// principal id is accepted.
    pub fn with_principal_directory(mut self, directory: Arc<dyn PrincipalDirectory>) -> Self {
        self.principals = Some(directory);
        self
    }

    pub fn library(&self) -> &Arc<RuleLibrary> {
        &self.library
    }

    pub fn specifiers(&self) -> &S {
        &self.specifiers
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    fn serialize(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Validate and persist a new rule, then add it to the tree.
    pub fn create(&self, draft: RuleDraft) -> Result<RuleRecord, RepositoryError> {
        let _guard = self.serialize();

        let resolved = self.validate(&draft)?;
        let now = Utc::now();
        let record = RuleRecord {
            id: RuleId::new(),
            specifier_id: resolved.entity.id,
            role: draft.role,
            principal_id: draft.principal_id,
            positive: draft.positive,
            propagates: draft.propagates,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.records.insert(record.clone()) {
            if resolved.created {
                self.discard_specifier(resolved.entity.id);
            }
            return Err(err.into());
        }

        self.library.add_rule(&record.to_rule(resolved.entity.specifier.clone()));
        info!(
            rule_id = %record.id,
            specifier = %resolved.entity.specifier,
            role = ?record.role,
            principal_id = ?record.principal_id,
            positive = record.positive,
            "auth rule created"
        );
        Ok(record)
    }

    /// Replace the rule `id` with `draft`, keeping its id and creation time.
    pub fn update(&self, id: RuleId, draft: RuleDraft) -> Result<RuleRecord, RepositoryError> {
        let _guard = self.serialize();

        let old = self.records.get(id)?.ok_or(RepositoryError::RuleNotFound(id))?;
        let old_specifier = self.specifier_of(&old)?;
        let retained = self.retained_rules(&old)?;
        let resolved = self.validate(&draft)?;

        let new = RuleRecord {
            id,
            specifier_id: resolved.entity.id,
            role: draft.role,
            principal_id: draft.principal_id,
            positive: draft.positive,
            propagates: draft.propagates,
            created_at: old.created_at,
            updated_at: Utc::now(),
        };

        if let Err(err) = self.records.update(new.clone()) {
            if resolved.created {
                self.discard_specifier(resolved.entity.id);
            }
            return Err(err.into());
        }

        if !old.same_effect(&new) {
            self.library.update_rule_retaining(
                &old.to_rule(old_specifier),
                &new.to_rule(resolved.entity.specifier.clone()),
                &retained,
            );
        }

        if old.specifier_id != new.specifier_id {
            self.collect_specifier(old.specifier_id)?;
        }

        info!(
            rule_id = %id,
            specifier = %resolved.entity.specifier,
            role = ?new.role,
            principal_id = ?new.principal_id,
            positive = new.positive,
            "auth rule updated"
        );
        Ok(new)
    }

    /// Delete the rule `id`, take it out of the tree and collect its
    /// specifier if nothing else references it.
    pub fn remove(&self, id: RuleId) -> Result<RuleRecord, RepositoryError> {
        let _guard = self.serialize();

        let record = self.records.get(id)?.ok_or(RepositoryError::RuleNotFound(id))?;
        let specifier = self.specifier_of(&record)?;
        let retained = self.retained_rules(&record)?;
        self.records.delete(id)?;

        self.library
            .remove_rule_retaining(&record.to_rule(specifier.clone()), &retained);
        self.collect_specifier(record.specifier_id)?;

        info!(rule_id = %id, specifier = %specifier, "auth rule removed");
        Ok(record)
    }

    pub fn get(&self, id: RuleId) -> Result<Option<RuleRecord>, RepositoryError> {
        Ok(self.records.get(id)?)
    }

    pub fn list(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, RepositoryError> {
        Ok(self.records.list(filter)?)
    }

    /// The specifier a stored record points at.
    pub fn specifier_of(&self, record: &RuleRecord) -> Result<Specifier, RepositoryError> {
        match self.specifiers.load(record.specifier_id)? {
            Some(entity) => Ok(entity.specifier),
            None => Err(StoreError::Conflict(format!(
                "rule {} references missing specifier {}",
                record.id, record.specifier_id
            ))
            .into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────

    /// Check `draft` and resolve its specifier, creating the specifier only
    /// once every other check has passed.
    fn validate(&self, draft: &RuleDraft) -> Result<ResolvedSpecifier, RepositoryError> {
        if draft.role.is_none() && draft.principal_id.is_none() {
            return Err(ValidationError::MissingSubject.into());
        }

        let literal = draft
            .specifier
            .as_deref()
            .map(Specifier::parse)
            .transpose()
            .map_err(ValidationError::from)?;

        if let (Some(principal_id), Some(directory)) = (draft.principal_id, &self.principals) {
            if !directory.exists(principal_id)? {
                return Err(ValidationError::UnknownPrincipal(principal_id).into());
            }
        }

        match (draft.specifier_id, literal) {
            (Some(id), literal) => {
                let entity = self
                    .specifiers
                    .load(id)?
                    .ok_or(ValidationError::UnknownSpecifier(id))?;
                if let Some(given) = literal {
                    if given != entity.specifier {
                        return Err(ValidationError::SpecifierMismatch {
                            id,
                            stored: entity.specifier.to_string(),
                            given: given.to_string(),
                        }
                        .into());
                    }
                }
                Ok(ResolvedSpecifier {
                    entity,
                    created: false,
                })
            }
            (None, Some(specifier)) => match self.specifiers.find(&specifier)? {
                Some(entity) => Ok(ResolvedSpecifier {
                    entity,
                    created: false,
                }),
                None => {
                    let entity = self.specifiers.create(specifier)?;
                    debug!(specifier = %entity.specifier, specifier_id = %entity.id, "specifier created");
                    Ok(ResolvedSpecifier {
                        entity,
                        created: true,
                    })
                }
            },
            (None, None) => Err(ValidationError::MissingSpecifier.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Housekeeping
    // ─────────────────────────────────────────────────────────────────────

    /// Rules of the other stored records that share a subject value and
    /// polarity with `record`, i.e. the ones that may still write the values
    /// it is about to take out of the tree.
    fn retained_rules(&self, record: &RuleRecord) -> Result<Vec<Rule>, RepositoryError> {
        let mut filters = Vec::new();
        if let Some(role) = &record.role {
            filters.push(RuleFilter::all().with_role(role.clone()));
        }
        if let Some(principal_id) = record.principal_id {
            filters.push(RuleFilter::all().with_principal(principal_id));
        }

        let mut seen = HashSet::from([record.id]);
        let mut retained = Vec::new();
        for filter in filters {
            for other in self.records.list(&filter.with_positive(record.positive))? {
                if !seen.insert(other.id) {
                    continue;
                }
                // Replay skips dangling records too, so they hold nothing in the tree.
                match self.specifiers.load(other.specifier_id)? {
                    Some(entity) => retained.push(other.to_rule(entity.specifier)),
                    None => warn!(
                        rule_id = %other.id,
                        specifier_id = %other.specifier_id,
                        "ignoring rule with a dangling specifier reference"
                    ),
                }
            }
        }
        if !retained.is_empty() {
            debug!(rule_id = %record.id, retained = retained.len(), "tree values shared with other records");
        }
        Ok(retained)
    }

    /// Delete the specifier `id` if no record references it.
    fn collect_specifier(&self, id: SpecifierId) -> Result<bool, RepositoryError> {
        if !self.records.list(&RuleFilter::by_specifier(id))?.is_empty() {
            return Ok(false);
        }
        self.specifiers.remove(id)?;
        info!(specifier_id = %id, "unreferenced specifier collected");
        Ok(true)
    }

    /// Undo a lazily created specifier after a failed write.
    fn discard_specifier(&self, id: SpecifierId) {
        if let Err(err) = self.specifiers.remove(id) {
            warn!(specifier_id = %id, error = %err, "failed to discard specifier after failed write");
        }
    }
}
