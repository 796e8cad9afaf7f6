use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sentinel_crypto::SigningKey;
use sentinel_types::{EventType, LedgerProof, PhotoHash, SessionId};

use crate::call::{ContractCall, FieldLimits, PostConditionMode};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::{LedgerClient, LedgerNetwork};

/// Target contract and submission parameters.
#[derive(Clone, Debug)]
pub struct ContractConfig {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    pub fee: u64,
    pub limits: FieldLimits,
    /// Bound on the nonce fetch.
    pub nonce_timeout: Duration,
    /// Bound on the broadcast.
    pub broadcast_timeout: Duration,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            contract_address: "ST1PQHQKV0RJXZFYVDEQMMKSWZQAG97KXKPSWD05E".into(),
            contract_name: "access-log".into(),
            function_name: "log-entry".into(),
            fee: 1000,
            limits: FieldLimits::ACCESS_LOG,
            nonce_timeout: Duration::from_secs(10),
            broadcast_timeout: Duration::from_secs(10),
        }
    }
}

/// [`LedgerClient`] that submits signed contract calls to a [`LedgerNetwork`].
///
/// Each submission is: fetch nonce -> build and bound arguments -> sign ->
/// broadcast. Both network calls are individually time-bounded.
pub struct ContractLedgerClient {
    network: Arc<dyn LedgerNetwork>,
    config: ContractConfig,
}

impl ContractLedgerClient {
    pub fn new(network: Arc<dyn LedgerNetwork>, config: ContractConfig) -> Self {
        Self { network, config }
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }
}

async fn bounded_call<T>(
    stage: &'static str,
    limit: Duration,
    fut: impl Future<Output = LedgerResult<T>>,
) -> LedgerResult<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LedgerError::Timeout {
            stage,
            after_ms: limit.as_millis() as u64,
        })?
}

#[async_trait]
impl LedgerClient for ContractLedgerClient {
    async fn log_event(
        &self,
        session_id: &SessionId,
        event_type: EventType,
        photo_hash: &PhotoHash,
        key: &SigningKey,
    ) -> LedgerResult<LedgerProof> {
        let args = ContractCall::event_args(session_id, event_type, photo_hash, &self.config.limits);
        if args[0] != session_id.as_str() {
            tracing::debug!(%session_id, max = self.config.limits.session_id, "session id truncated for ledger call");
        }

        let sender = key.sender_address();
        let nonce = bounded_call(
            "nonce fetch",
            self.config.nonce_timeout,
            self.network.account_nonce(&sender),
        )
        .await?;

        let call = ContractCall {
            contract_address: self.config.contract_address.clone(),
            contract_name: self.config.contract_name.clone(),
            function_name: self.config.function_name.clone(),
            args,
            sender,
            sender_key: hex::encode(key.verifying_key().as_bytes()),
            nonce,
            fee: self.config.fee,
            post_condition_mode: PostConditionMode::Allow,
        };
        call.check_limits(&self.config.limits)?;
        let signed = call.sign(key)?;

        tracing::debug!(%session_id, %event_type, nonce, "broadcasting ledger call");
        let response = bounded_call(
            "broadcast",
            self.config.broadcast_timeout,
            self.network.broadcast(&signed),
        )
        .await?;

        Ok(LedgerProof {
            tx_ref: response.tx_ref,
            block_ref: response.block_ref,
            event_id: response.event_id,
            timestamp: Utc::now(),
        })
    }
}
