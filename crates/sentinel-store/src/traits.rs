use async_trait::async_trait;
use bytes::Bytes;
use sentinel_types::ContentId;

use crate::error::StoreResult;

/// Handle returned for a successfully stored photo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredPhoto {
    /// Provider-assigned content identifier.
    pub content_id: ContentId,
    /// Public retrieval URL.
    pub url: String,
    /// Stored size in bytes.
    pub size: u64,
}

/// Content-addressed object store for captured photos.
///
/// Implementations must satisfy these invariants:
/// - Objects are immutable once written.
/// - `upload` either stores the bytes and returns a handle, or fails with
///   no handle; there is no partial success.
/// - Upload is not retried internally.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store raw bytes under a provider-assigned content id.
    async fn upload(&self, data: Bytes, filename: &str) -> StoreResult<StoredPhoto>;

    /// Retrieve raw bytes by content id.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    async fn fetch(&self, id: &ContentId) -> StoreResult<Option<Bytes>>;

    /// Check whether an object exists in the store.
    async fn exists(&self, id: &ContentId) -> StoreResult<bool>;

    /// Public retrieval URL for a content id.
    fn url_for(&self, id: &ContentId) -> String;
}
