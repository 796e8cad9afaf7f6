use sentinel_types::{ContentId, TypeError};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ContentId),

    /// The storage provider rejected the request or could not be reached.
    #[error("storage provider error: {0}")]
    Upstream(String),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {0}")]
    HashMismatch(ContentId),

    /// Attempted to upload zero bytes.
    #[error("refusing to store an empty object")]
    EmptyObject,

    #[error("invalid content id: {0}")]
    InvalidId(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
