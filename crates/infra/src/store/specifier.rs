//! Specifier storage.

use std::sync::{Arc, RwLock};

use warden_auth::SpecifierEntity;
use warden_core::{Specifier, SpecifierId};

use super::StoreError;

/// Specifier store abstraction.
///
/// Specifiers are unique by string; rule records reference them by id.
pub trait SpecifierStore: Send + Sync {
    /// Look a specifier up by its string form.
    fn find(&self, specifier: &Specifier) -> Result<Option<SpecifierEntity>, StoreError>;

    /// Persist a new specifier. Fails if the string is already stored.
    fn create(&self, specifier: Specifier) -> Result<SpecifierEntity, StoreError>;

    /// Load a specifier by id.
    fn load(&self, id: SpecifierId) -> Result<Option<SpecifierEntity>, StoreError>;

    /// Delete a specifier by id.
    fn remove(&self, id: SpecifierId) -> Result<(), StoreError>;

    /// All stored specifiers, in creation order.
    fn list(&self) -> Result<Vec<SpecifierEntity>, StoreError>;
}

impl<S> SpecifierStore for Arc<S>
where
    S: SpecifierStore + ?Sized,
{
    fn find(&self, specifier: &Specifier) -> Result<Option<SpecifierEntity>, StoreError> {
        (**self).find(specifier)
    }

    fn create(&self, specifier: Specifier) -> Result<SpecifierEntity, StoreError> {
        (**self).create(specifier)
    }

    fn load(&self, id: SpecifierId) -> Result<Option<SpecifierEntity>, StoreError> {
        (**self).load(id)
    }

    fn remove(&self, id: SpecifierId) -> Result<(), StoreError> {
        (**self).remove(id)
    }

    fn list(&self) -> Result<Vec<SpecifierEntity>, StoreError> {
        (**self).list()
    }
}

/// In-memory specifier store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySpecifierStore {
    entities: RwLock<Vec<SpecifierEntity>>,
}

impl InMemorySpecifierStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl SpecifierStore for InMemorySpecifierStore {
    fn find(&self, specifier: &Specifier) -> Result<Option<SpecifierEntity>, StoreError> {
        let entities = self.entities.read().map_err(|_| StoreError::poisoned())?;
        Ok(entities.iter().find(|e| &e.specifier == specifier).cloned())
    }

    fn create(&self, specifier: Specifier) -> Result<SpecifierEntity, StoreError> {
        let mut entities = self.entities.write().map_err(|_| StoreError::poisoned())?;
        if entities.iter().any(|e| e.specifier == specifier) {
            return Err(StoreError::AlreadyExists(format!("specifier '{specifier}'")));
        }
        let entity = SpecifierEntity {
            id: SpecifierId::new(),
            specifier,
        };
        entities.push(entity.clone());
        Ok(entity)
    }

    fn load(&self, id: SpecifierId) -> Result<Option<SpecifierEntity>, StoreError> {
        let entities = self.entities.read().map_err(|_| StoreError::poisoned())?;
        Ok(entities.iter().find(|e| e.id == id).cloned())
    }

    fn remove(&self, id: SpecifierId) -> Result<(), StoreError> {
        let mut entities = self.entities.write().map_err(|_| StoreError::poisoned())?;
        let Some(index) = entities.iter().position(|e| e.id == id) else {
            return Err(StoreError::NotFound(format!("specifier {id}")));
        };
        entities.remove(index);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SpecifierEntity>, StoreError> {
        let entities = self.entities.read().map_err(|_| StoreError::poisoned())?;
        Ok(entities.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(raw: &str) -> Specifier {
        Specifier::parse(raw).unwrap()
    }

    #[test]
    fn create_is_unique_by_string() {
        let store = InMemorySpecifierStore::new();
        let created = store.create(spec("model.read")).unwrap();

        assert_eq!(store.find(&spec("model.read")).unwrap(), Some(created.clone()));
        assert_eq!(store.load(created.id).unwrap(), Some(created));
        assert!(matches!(
            store.create(spec("model.read")),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn remove_unknown_id_is_not_found() {
        let store = InMemorySpecifierStore::new();
        let created = store.create(spec("a")).unwrap();

        store.remove(created.id).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(store.remove(created.id), Err(StoreError::NotFound(_))));
    }
}
