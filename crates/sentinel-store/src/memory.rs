use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use sentinel_crypto::ContentHasher;
use sentinel_types::ContentId;

use crate::error::{StoreError, StoreResult};
use crate::gateway::Gateway;
use crate::traits::{ObjectStore, StoredPhoto};

struct StoredObject {
    data: Bytes,
    filename: String,
}

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ContentId, StoredObject>>,
    gateway: Gateway,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store served from the default gateway.
    pub fn new() -> Self {
        Self::with_gateway(Gateway::default())
    }

    pub fn with_gateway(gateway: Gateway) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            gateway,
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Filename recorded with the first upload of an object.
    pub fn filename(&self, id: &ContentId) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|m| m.get(id).map(|o| o.filename.clone()))
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Upstream("object store lock poisoned".into())
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload(&self, data: Bytes, filename: &str) -> StoreResult<StoredPhoto> {
        if data.is_empty() {
            return Err(StoreError::EmptyObject);
        }
        let content_id = ContentHasher::MEMORY.content_id(&data);
        let size = data.len() as u64;
        let mut map = self.objects.write().map_err(|_| poisoned())?;
        // Idempotent: the same bytes always map to the same id.
        map.entry(content_id.clone()).or_insert_with(|| StoredObject {
            data,
            filename: filename.to_string(),
        });
        drop(map);

        tracing::debug!(%content_id, filename, size, "stored object in memory");
        Ok(StoredPhoto {
            url: self.gateway.url_for(&content_id),
            content_id,
            size,
        })
    }

    async fn fetch(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        let map = self.objects.read().map_err(|_| poisoned())?;
        Ok(map.get(id).map(|o| o.data.clone()))
    }

    async fn exists(&self, id: &ContentId) -> StoreResult<bool> {
        let map = self.objects.read().map_err(|_| poisoned())?;
        Ok(map.contains_key(id))
    }

    fn url_for(&self, id: &ContentId) -> String {
        self.gateway.url_for(id)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .field("gateway", &self.gateway.base())
            .finish()
    }
}
