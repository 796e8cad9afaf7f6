//! Append-only ledger integration for Sentinel.
//!
//! Every committed ENTRY or EXIT is written to an external ledger as a
//! contract call carrying three size-bounded string arguments: session id,
//! event type, and photo hash. This crate provides:
//!
//! - [`LedgerClient`] -- the `log_event` contract consumed by the pipeline
//! - [`LedgerNetwork`] -- nonce fetch and broadcast against a ledger node
//! - [`ContractLedgerClient`] -- builds, bounds, signs, and submits calls
//! - [`InMemoryLedgerNetwork`] -- hash-chained chain for tests and local runs
//!
//! Argument limits are enforced before anything reaches the network. A
//! stale nonce is reported as [`LedgerError::StaleNonce`], which callers
//! treat as retryable.

pub mod call;
pub mod client;
pub mod error;
pub mod memory;
pub mod traits;

pub use call::{bounded, ContractCall, FieldLimits, PostConditionMode, SignedCall};
pub use client::{ContractConfig, ContractLedgerClient};
pub use error::{LedgerError, LedgerResult};
pub use memory::{InMemoryLedgerNetwork, Transaction};
pub use traits::{BroadcastResponse, LedgerClient, LedgerNetwork};
