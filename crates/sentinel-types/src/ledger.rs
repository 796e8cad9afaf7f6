use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventId;

/// Proof that the external ledger accepted an event record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerProof {
    /// Transaction reference returned by the ledger broadcast.
    pub tx_ref: String,
    /// Block height, when the ledger reports one synchronously.
    pub block_ref: Option<u64>,
    /// Event sequence id assigned by the ledger, if any.
    pub event_id: Option<EventId>,
    /// When the ledger acknowledged the record.
    pub timestamp: DateTime<Utc>,
}

/// Result of committing an event to the ledger.
///
/// `Confirmed` only ever wraps a [`LedgerProof`] taken from a ledger
/// response. A failed submission is `Pending` with the failure reason.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LedgerOutcome {
    Confirmed(LedgerProof),
    Pending { reason: String },
}

impl LedgerOutcome {
    pub fn pending(reason: impl Into<String>) -> Self {
        Self::Pending {
            reason: reason.into(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    pub fn proof(&self) -> Option<&LedgerProof> {
        match self {
            Self::Confirmed(proof) => Some(proof),
            Self::Pending { .. } => None,
        }
    }

    pub fn tx_ref(&self) -> Option<&str> {
        self.proof().map(|p| p.tx_ref.as_str())
    }

    pub fn pending_reason(&self) -> Option<&str> {
        match self {
            Self::Pending { reason } => Some(reason),
            Self::Confirmed(_) => None,
        }
    }
}
