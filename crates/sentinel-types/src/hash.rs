use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum accepted length of a storage content identifier.
const MAX_CONTENT_ID_LEN: usize = 128;

/// SHA-256 hash computed directly over raw image bytes.
///
/// This is the tamper-evidence value committed to the ledger. It is always
/// computed locally and is independent of whatever handle the object store
/// hands back for the same bytes (see [`ContentId`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhotoHash([u8; 32]);

impl PhotoHash {
    /// Wrap a pre-computed digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for PhotoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhotoHash({})", self.short_hex())
    }
}

impl fmt::Display for PhotoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for PhotoHash {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<PhotoHash> for String {
    fn from(hash: PhotoHash) -> Self {
        hash.to_hex()
    }
}

/// Storage/retrieval handle returned by an object store.
///
/// Provider-specific: byte-identical content may get different IDs from
/// different providers. Restricted to a URL- and path-safe alphabet because
/// it arrives in request paths and names files on disk.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || s.len() > MAX_CONTENT_ID_LEN {
            return Err(TypeError::InvalidIdentifier {
                kind: "content id",
                reason: format!("length must be 1..={MAX_CONTENT_ID_LEN}"),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TypeError::InvalidIdentifier {
                kind: "content id",
                reason: "only ASCII letters, digits, '-' and '_' are allowed".into(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Build an identifier from an alphanumeric prefix and a digest.
    pub fn from_digest(prefix: &'static str, digest: &[u8; 32]) -> Self {
        debug_assert!(prefix.chars().all(|c| c.is_ascii_alphanumeric()));
        Self(format!("{prefix}{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}
