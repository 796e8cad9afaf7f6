use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use sentinel_types::CompanyPin;

use crate::error::{SessionStoreError, SessionStoreResult};

/// Source of truth for which facility PINs may record events.
#[async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn is_known(&self, pin: &CompanyPin) -> SessionStoreResult<bool>;
}

/// Facility directory held in memory, usually loaded from configuration.
#[derive(Default)]
pub struct InMemoryFacilityDirectory {
    pins: RwLock<HashSet<CompanyPin>>,
}

impl InMemoryFacilityDirectory {
    pub fn new(pins: impl IntoIterator<Item = CompanyPin>) -> Self {
        Self {
            pins: RwLock::new(pins.into_iter().collect()),
        }
    }

    /// Register a facility. Returns `false` if it was already known.
    pub fn register(&self, pin: CompanyPin) -> SessionStoreResult<bool> {
        let mut pins = self
            .pins
            .write()
            .map_err(|_| SessionStoreError::Unavailable("facility directory lock poisoned".into()))?;
        Ok(pins.insert(pin))
    }

    pub fn len(&self) -> usize {
        self.pins.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FacilityDirectory for InMemoryFacilityDirectory {
    async fn is_known(&self, pin: &CompanyPin) -> SessionStoreResult<bool> {
        let pins = self
            .pins
            .read()
            .map_err(|_| SessionStoreError::Unavailable("facility directory lock poisoned".into()))?;
        Ok(pins.contains(pin))
    }
}
