use sha2::{Digest, Sha256};
use sentinel_types::{ContentId, PhotoHash};

/// SHA-256 over raw image bytes.
///
/// This value goes to the ledger. It must never be derived from a storage
/// identifier, and storage identifiers must never be derived from it.
pub fn photo_hash(data: &[u8]) -> PhotoHash {
    let digest = Sha256::digest(data);
    PhotoHash::from_digest(digest.into())
}

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so the same bytes stored by different backends get
/// different identifiers.
pub struct ContentHasher {
    domain: &'static str,
    prefix: &'static str,
}

impl ContentHasher {
    /// Hasher for the in-memory object store.
    pub const MEMORY: Self = Self {
        domain: "sentinel-memory-v1",
        prefix: "bm",
    };
    /// Hasher for the filesystem object store.
    pub const FILESYSTEM: Self = Self {
        domain: "sentinel-fs-v1",
        prefix: "bf",
    };

    /// Create a hasher with a custom domain tag and identifier prefix.
    pub const fn new(domain: &'static str, prefix: &'static str) -> Self {
        Self { domain, prefix }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Content identifier for the given bytes: prefix followed by hex digest.
    pub fn content_id(&self, data: &[u8]) -> ContentId {
        ContentId::from_digest(self.prefix, &self.hash(data))
    }

    /// Verify that data produces the expected content identifier.
    pub fn verify(&self, data: &[u8], expected: &ContentId) -> bool {
        self.content_id(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
