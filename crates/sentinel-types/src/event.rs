use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::hash::{ContentId, PhotoHash};
use crate::identity::SessionId;
use crate::ledger::{LedgerOutcome, LedgerProof};

/// Unique event sequence number.
///
/// Assigned by the ledger when it reports one, otherwise synthesized by the
/// session store as `max(existing) + 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of physical event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Entry,
    Exit,
}

impl EventType {
    /// Wire form used in the event log and in ledger call arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
        }
    }

    /// Prefix used for uploaded photo filenames.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record, one per committed Entry or Exit action.
///
/// `photo_hash` is the SHA-256 of the raw bytes; `photo_storage_ref` is the
/// object store's handle. `processed` becomes `true` only once every commit
/// step for the action has completed, including ledger confirmation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub event_id: EventId,
    pub session_id: SessionId,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub photo_hash: PhotoHash,
    pub ledger_tx_ref: Option<String>,
    pub ledger_block_ref: Option<u64>,
    pub photo_url: String,
    pub photo_storage_ref: ContentId,
    pub confidence: f64,
    pub processed: bool,
    pub processing_error: Option<String>,
    /// Descriptor captured with the photo, needed to replay a pending exit.
    pub descriptor: Descriptor,
    /// Correlation distance for EXIT events.
    pub match_distance: Option<f64>,
}

impl EventLogEntry {
    /// Build an entry whose processing state mirrors a ledger outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn from_outcome(
        event_id: EventId,
        session_id: SessionId,
        event_type: EventType,
        timestamp: DateTime<Utc>,
        photo_hash: PhotoHash,
        photo_url: String,
        photo_storage_ref: ContentId,
        descriptor: Descriptor,
        confidence: f64,
        match_distance: Option<f64>,
        ledger: &LedgerOutcome,
    ) -> Self {
        let mut entry = Self {
            event_id,
            session_id,
            event_type,
            timestamp,
            photo_hash,
            ledger_tx_ref: None,
            ledger_block_ref: None,
            photo_url,
            photo_storage_ref,
            confidence: confidence.clamp(0.0, 1.0),
            processed: false,
            processing_error: None,
            descriptor,
            match_distance,
        };
        match ledger {
            LedgerOutcome::Confirmed(proof) => entry.confirm(proof),
            LedgerOutcome::Pending { reason } => entry.mark_failed(reason.clone()),
        }
        entry
    }

    /// Record ledger proof and mark the action fully processed.
    pub fn confirm(&mut self, proof: &LedgerProof) {
        self.ledger_tx_ref = Some(proof.tx_ref.clone());
        self.ledger_block_ref = proof.block_ref;
        self.processed = true;
        self.processing_error = None;
    }

    /// Record a processing failure; the entry stays unprocessed.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.processed = false;
        self.processing_error = Some(reason.into());
    }

    pub fn is_pending(&self) -> bool {
        !self.processed
    }
}
