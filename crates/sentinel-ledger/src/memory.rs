use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sentinel_types::EventId;

use crate::call::{FieldLimits, SignedCall};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::{BroadcastResponse, LedgerNetwork};

/// One accepted call, linked to its predecessor by `prev_tx_ref`.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub seq: u64,
    pub tx_ref: String,
    pub prev_tx_ref: Option<String>,
    pub block_height: u64,
    pub call: SignedCall,
    pub event_id: Option<EventId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct CanonicalTx<'a> {
    seq: u64,
    prev_tx_ref: Option<&'a str>,
    block_height: u64,
    call: &'a SignedCall,
    event_id: Option<EventId>,
    timestamp: &'a DateTime<Utc>,
}

impl Transaction {
    fn compute_ref(&self) -> LedgerResult<String> {
        tx_ref_for(&CanonicalTx {
            seq: self.seq,
            prev_tx_ref: self.prev_tx_ref.as_deref(),
            block_height: self.block_height,
            call: &self.call,
            event_id: self.event_id,
            timestamp: &self.timestamp,
        })
    }
}

fn tx_ref_for(canonical: &CanonicalTx<'_>) -> LedgerResult<String> {
    let encoded =
        serde_json::to_vec(canonical).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"sentinel-tx-v1:");
    hasher.update(&encoded);
    Ok(format!("0x{}", hex::encode(hasher.finalize().as_bytes())))
}

#[derive(Default)]
struct ChainState {
    txs: Vec<Transaction>,
    nonces: HashMap<String, u64>,
    last_event_id: u64,
}

/// In-memory ledger node for tests, local runs, and embedding.
///
/// Accepts signed calls in strict per-sender nonce order and appends each to
/// a single hash chain. One transaction per block.
pub struct InMemoryLedgerNetwork {
    inner: RwLock<ChainState>,
    assigns_event_ids: bool,
    offline: AtomicBool,
    limits: FieldLimits,
}

impl InMemoryLedgerNetwork {
    pub fn new() -> Self {
        Self::with_options(true, FieldLimits::ACCESS_LOG)
    }

    pub fn with_options(assigns_event_ids: bool, limits: FieldLimits) -> Self {
        Self {
            inner: RwLock::new(ChainState::default()),
            assigns_event_ids,
            offline: AtomicBool::new(false),
            limits,
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn transactions(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.read()?.txs.clone())
    }

    pub fn event_count(&self) -> LedgerResult<usize> {
        Ok(self.read()?.txs.len())
    }

    /// Transactions whose first argument is `session_id`.
    pub fn events_for_session(&self, session_id: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .read()?
            .txs
            .iter()
            .filter(|tx| tx.call.call.args.first().map(String::as_str) == Some(session_id))
            .cloned()
            .collect())
    }

    /// Validate sequence numbers, hash links, recomputed refs, and signatures.
    pub fn validate_chain(&self) -> LedgerResult<()> {
        let state = self.read()?;
        for (index, tx) in state.txs.iter().enumerate() {
            let expected_seq = (index + 1) as u64;
            if tx.seq != expected_seq {
                return Err(LedgerError::IntegrityViolation {
                    seq: tx.seq,
                    reason: format!("expected seq {expected_seq}, found {}", tx.seq),
                });
            }
            let expected_prev = index
                .checked_sub(1)
                .map(|prev| state.txs[prev].tx_ref.as_str());
            if tx.prev_tx_ref.as_deref() != expected_prev {
                return Err(LedgerError::IntegrityViolation {
                    seq: tx.seq,
                    reason: "previous tx link mismatch".into(),
                });
            }
            if tx.compute_ref()? != tx.tx_ref {
                return Err(LedgerError::IntegrityViolation {
                    seq: tx.seq,
                    reason: "tx ref mismatch".into(),
                });
            }
            tx.call.verify().map_err(|_| LedgerError::IntegrityViolation {
                seq: tx.seq,
                reason: "signature does not verify".into(),
            })?;
        }
        Ok(())
    }

    fn read(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, ChainState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Unavailable("ledger read lock poisoned".into()))
    }

    fn ensure_online(&self) -> LedgerResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("ledger node offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryLedgerNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerNetwork for InMemoryLedgerNetwork {
    async fn account_nonce(&self, address: &str) -> LedgerResult<u64> {
        self.ensure_online()?;
        Ok(self.read()?.nonces.get(address).copied().unwrap_or(0))
    }

    async fn broadcast(&self, call: &SignedCall) -> LedgerResult<BroadcastResponse> {
        self.ensure_online()?;
        call.verify()?;
        call.call.check_limits(&self.limits)?;

        let mut state = self
            .inner
            .write()
            .map_err(|_| LedgerError::Unavailable("ledger write lock poisoned".into()))?;

        let expected = state.nonces.get(&call.call.sender).copied().unwrap_or(0);
        let got = call.call.nonce;
        if got < expected {
            return Err(LedgerError::StaleNonce { expected, got });
        }
        if got > expected {
            return Err(LedgerError::Rejected(format!(
                "nonce {got} is ahead of expected {expected}"
            )));
        }

        let seq = (state.txs.len() + 1) as u64;
        let event_id = if self.assigns_event_ids {
            state.last_event_id += 1;
            Some(EventId::new(state.last_event_id))
        } else {
            None
        };
        let prev_tx_ref = state.txs.last().map(|tx| tx.tx_ref.clone());
        let timestamp = Utc::now();
        let tx_ref = tx_ref_for(&CanonicalTx {
            seq,
            prev_tx_ref: prev_tx_ref.as_deref(),
            block_height: seq,
            call,
            event_id,
            timestamp: &timestamp,
        })?;

        state.txs.push(Transaction {
            seq,
            tx_ref: tx_ref.clone(),
            prev_tx_ref,
            block_height: seq,
            call: call.clone(),
            event_id,
            timestamp,
        });
        state.nonces.insert(call.call.sender.clone(), expected + 1);
        tracing::debug!(seq, %tx_ref, sender = %call.call.sender, "ledger tx appended");

        Ok(BroadcastResponse {
            tx_ref,
            block_ref: Some(seq),
            event_id,
        })
    }
}
