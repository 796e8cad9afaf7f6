//! Cryptographic primitives for Sentinel.
//!
//! Two independent hashes are computed over every captured photo:
//!
//! - [`photo_hash`]: SHA-256 over the raw bytes, committed to the ledger
//!   as tamper evidence.
//! - [`ContentHasher`]: domain-separated BLAKE3, used by the local object
//!   stores to derive content identifiers.
//!
//! Ledger submissions are signed with Ed25519 ([`SigningKey`]).
//!
//! All crypto operations wrap established libraries, no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::{photo_hash, ContentHasher};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
