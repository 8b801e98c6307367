//! Rule record storage.

use std::sync::{Arc, RwLock};

use warden_auth::{PrincipalId, Role, RuleRecord};
use warden_core::{RuleId, SpecifierId};

use super::StoreError;

/// Field filter for [`RuleRecordStore::list`]. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub specifier_id: Option<SpecifierId>,
    pub role: Option<Role>,
    pub principal_id: Option<PrincipalId>,
    pub positive: Option<bool>,
}

impl RuleFilter {
    /// Matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_specifier(specifier_id: SpecifierId) -> Self {
        Self {
            specifier_id: Some(specifier_id),
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

    pub fn with_positive(mut self, positive: bool) -> Self {
        self.positive = Some(positive);
        self
    }

    pub fn matches(&self, record: &RuleRecord) -> bool {
        self.specifier_id.is_none_or(|id| record.specifier_id == id)
            && self.role.as_ref().is_none_or(|role| record.role.as_ref() == Some(role))
            && self
                .principal_id
                .is_none_or(|id| record.principal_id == Some(id))
            && self.positive.is_none_or(|positive| record.positive == positive)
    }
}

/// Rule record store abstraction.
pub trait RuleRecordStore: Send + Sync {
    /// Persist a new record. Fails if the id is taken.
    fn insert(&self, record: RuleRecord) -> Result<(), StoreError>;

    fn get(&self, id: RuleId) -> Result<Option<RuleRecord>, StoreError>;

    /// Replace an existing record in place.
    fn update(&self, record: RuleRecord) -> Result<(), StoreError>;

    /// Delete a record, returning what was stored.
    fn delete(&self, id: RuleId) -> Result<RuleRecord, StoreError>;

    /// Records matching `filter`, in insertion order.
    fn list(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, StoreError>;
}

impl<S> RuleRecordStore for Arc<S>
where
    S: RuleRecordStore + ?Sized,
{
    fn insert(&self, record: RuleRecord) -> Result<(), StoreError> {
        (**self).insert(record)
    }

    fn get(&self, id: RuleId) -> Result<Option<RuleRecord>, StoreError> {
        (**self).get(id)
    }

    fn update(&self, record: RuleRecord) -> Result<(), StoreError> {
        (**self).update(record)
    }

    fn delete(&self, id: RuleId) -> Result<RuleRecord, StoreError> {
        (**self).delete(id)
    }

    fn list(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, StoreError> {
        (**self).list(filter)
    }
}

/// In-memory rule record store for tests/dev.
///
/// Backed by a `Vec` so that listing order is insertion order, which is
/// the order records are replayed at startup.
#[derive(Debug, Default)]
pub struct InMemoryRuleRecordStore {
    records: RwLock<Vec<RuleRecord>>,
}

impl InMemoryRuleRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl RuleRecordStore for InMemoryRuleRecordStore {
    fn insert(&self, record: RuleRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::AlreadyExists(format!("rule {}", record.id)));
        }
        records.push(record);
        Ok(())
    }

    fn get(&self, id: RuleId) -> Result<Option<RuleRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    fn update(&self, record: RuleRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        let Some(slot) = records.iter_mut().find(|r| r.id == record.id) else {
            return Err(StoreError::NotFound(format!("rule {}", record.id)));
        };
        *slot = record;
        Ok(())
    }

    fn delete(&self, id: RuleId) -> Result<RuleRecord, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::poisoned())?;
        let Some(index) = records.iter().position(|r| r.id == id) else {
            return Err(StoreError::NotFound(format!("rule {id}")));
        };
        Ok(records.remove(index))
    }

    fn list(&self, filter: &RuleFilter) -> Result<Vec<RuleRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::poisoned())?;
        Ok(records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn record(specifier_id: SpecifierId, role: &'static str, positive: bool) -> RuleRecord {
        let now = Utc::now();
        RuleRecord {
            id: RuleId::new(),
            specifier_id,
            role: Some(role.into()),
            principal_id: None,
            positive,
            propagates: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn list_filters_and_keeps_insertion_order() {
        let store = InMemoryRuleRecordStore::new();
        let read = SpecifierId::new();
        let write = SpecifierId::new();

        let first = record(read, "user", true);
        let second = record(write, "user", false);
        let third = record(read, "admin", true);
        for r in [&first, &second, &third] {
            store.insert(r.clone()).unwrap();
        }

        let all = store.list(&RuleFilter::all()).unwrap();
        assert_eq!(all, vec![first.clone(), second.clone(), third.clone()]);

        let on_read = store.list(&RuleFilter::by_specifier(read)).unwrap();
        assert_eq!(on_read, vec![first.clone(), third]);

        let user_denies = store
            .list(&RuleFilter::all().with_role("user").with_positive(false))
            .unwrap();
        assert_eq!(user_denies, vec![second]);
    }

    #[test]
    fn update_and_delete_require_an_existing_record() {
        let store = InMemoryRuleRecordStore::new();
        let r = record(SpecifierId::new(), "user", true);

        assert!(matches!(store.update(r.clone()), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(r.id), Err(StoreError::NotFound(_))));

        store.insert(r.clone()).unwrap();
        assert!(matches!(store.insert(r.clone()), Err(StoreError::AlreadyExists(_))));

        let edited = RuleRecord {
            positive: false,
            ..r.clone()
        };
        store.update(edited.clone()).unwrap();
        assert_eq!(store.get(r.id).unwrap(), Some(edited.clone()));
        assert_eq!(store.delete(r.id).unwrap(), edited);
        assert_eq!(store.get(r.id).unwrap(), None);
    }
}
