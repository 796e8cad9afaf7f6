//! Content-addressed photo storage for Sentinel.
//!
//! Captured photos are uploaded to an object store that hands back a
//! [`ContentId`](sentinel_types::ContentId) and a retrieval URL. The content
//! id is a storage handle only; tamper evidence comes from the separately
//! computed SHA-256 photo hash.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- one file per object under a root directory
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; uploading identical bytes twice
//!    returns the same content id.
//! 2. Write-then-link: the filesystem backend writes to a temporary file and
//!    renames it into place.
//! 3. Uploads are never retried here. Retry and timeout policy belongs to
//!    the caller.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod gateway;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use gateway::Gateway;
pub use memory::InMemoryObjectStore;
pub use traits::{ObjectStore, StoredPhoto};
