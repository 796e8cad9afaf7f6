use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sentinel_types::{ContentId, EventId, LedgerOutcome, PhotoHash, SessionId, SessionStatus};

/// Inbound entry or exit capture, as decoded by the transport.
///
/// Nothing here is trusted yet: the pipeline validates the PIN format,
/// descriptor length and image before any external call.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub company_pin: String,
    pub descriptor: Vec<f64>,
    pub image: Bytes,
}

pub type EntryRequest = CaptureRequest;
pub type ExitRequest = CaptureRequest;

/// Result of a recorded entry. `ledger` is `Pending` when the ledger could
/// not be reached; the session exists either way.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryReceipt {
    pub session_id: SessionId,
    pub event_id: EventId,
    pub photo_hash: PhotoHash,
    pub storage_ref: ContentId,
    pub photo_url: String,
    pub ledger: LedgerOutcome,
    pub timestamp: DateTime<Utc>,
}

impl EntryReceipt {
    pub fn is_pending(&self) -> bool {
        !self.ledger.is_confirmed()
    }
}

/// Result of a recorded exit.
///
/// A confirmed ledger commit closes the session. A pending one leaves it
/// open with an unprocessed EXIT event that can be retried.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitReceipt {
    pub session_id: SessionId,
    pub event_id: EventId,
    pub photo_hash: PhotoHash,
    pub storage_ref: ContentId,
    pub photo_url: String,
    pub ledger: LedgerOutcome,
    pub match_distance: f64,
    pub match_confidence: f64,
    pub session_status: SessionStatus,
    pub timestamp: DateTime<Utc>,
}

impl ExitReceipt {
    pub fn is_pending(&self) -> bool {
        !self.ledger.is_confirmed()
    }
}
