//! Principal directory: the source of truth for which principal ids exist.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use warden_auth::PrincipalId;

use super::StoreError;

pub trait PrincipalDirectory: Send + Sync {
    fn exists(&self, principal_id: PrincipalId) -> Result<bool, StoreError>;
}

impl<S> PrincipalDirectory for Arc<S>
where
    S: PrincipalDirectory + ?Sized,
{
    fn exists(&self, principal_id: PrincipalId) -> Result<bool, StoreError> {
        (**self).exists(principal_id)
    }
}

/// In-memory principal directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalDirectory {
    known: RwLock<HashSet<PrincipalId>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principals<I>(principals: I) -> Self
    where
        I: IntoIterator<Item = PrincipalId>,
    {
        Self {
            known: RwLock::new(principals.into_iter().collect()),
        }
    }
}

impl PrincipalDirectory for InMemoryPrincipalDirectory {
    fn exists(&self, principal_id: PrincipalId) -> Result<bool, StoreError> {
        let known = self.known.read().map_err(|_| StoreError::poisoned())?;
        Ok(known.contains(&principal_id))
    }
}
