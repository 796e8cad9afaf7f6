use async_trait::async_trait;
use sentinel_crypto::SigningKey;
use sentinel_types::{EventId, EventType, LedgerProof, PhotoHash, SessionId};

use crate::call::SignedCall;
use crate::error::LedgerResult;

/// What a ledger node reports synchronously for an accepted broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub tx_ref: String,
    pub block_ref: Option<u64>,
    /// Present only when the deployment assigns event ids on-chain.
    pub event_id: Option<EventId>,
}

/// Low-level boundary to a ledger node.
#[async_trait]
pub trait LedgerNetwork: Send + Sync {
    /// Next nonce the ledger will accept from `address`.
    async fn account_nonce(&self, address: &str) -> LedgerResult<u64>;

    /// Submit a signed call. Fails with `StaleNonce` if the nonce has
    /// already been used.
    async fn broadcast(&self, call: &SignedCall) -> LedgerResult<BroadcastResponse>;
}

/// The event-logging contract consumed by the pipeline.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Commit one ENTRY/EXIT record and return the ledger's proof.
    ///
    /// Arguments are bounded to the contract's limits before submission.
    /// Implementations do not retry; `StaleNonce` is surfaced to the caller.
    async fn log_event(
        &self,
        session_id: &SessionId,
        event_type: EventType,
        photo_hash: &PhotoHash,
        key: &SigningKey,
    ) -> LedgerResult<LedgerProof>;
}
