use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sentinel_crypto::ContentHasher;
use sentinel_types::ContentId;

use crate::error::{StoreError, StoreResult};
use crate::gateway::Gateway;
use crate::traits::{ObjectStore, StoredPhoto};

/// Filesystem-backed object store: one file per object, named by content id.
///
/// Reads re-hash the file and fail with [`StoreError::HashMismatch`] if the
/// bytes on disk no longer match their id.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    gateway: Gateway,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>, gateway: Gateway) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, gateway })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ContentId) -> PathBuf {
        // ContentId's alphabet keeps this inside `root`.
        self.root.join(id.as_str())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, data: Bytes, filename: &str) -> StoreResult<StoredPhoto> {
        if data.is_empty() {
            return Err(StoreError::EmptyObject);
        }
        let content_id = ContentHasher::FILESYSTEM.content_id(&data);
        let path = self.object_path(&content_id);
        let size = data.len() as u64;

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(%content_id, "object already present on disk");
        } else {
            let tmp = self
                .root
                .join(format!(".{}.{:016x}.tmp", content_id, rand::random::<u64>()));
            tokio::fs::write(&tmp, &data).await?;
            if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
            tracing::debug!(%content_id, filename, size, "stored object on disk");
        }

        Ok(StoredPhoto {
            url: self.gateway.url_for(&content_id),
            content_id,
            size,
        })
    }

    async fn fetch(&self, id: &ContentId) -> StoreResult<Option<Bytes>> {
        let data = match tokio::fs::read(self.object_path(id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !ContentHasher::FILESYSTEM.verify(&data, id) {
            return Err(StoreError::HashMismatch(id.clone()));
        }
        Ok(Some(Bytes::from(data)))
    }

    async fn exists(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(tokio::fs::try_exists(self.object_path(id)).await?)
    }

    fn url_for(&self, id: &ContentId) -> String {
        self.gateway.url_for(id)
    }
}
