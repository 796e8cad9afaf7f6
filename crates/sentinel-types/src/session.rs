use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::TypeError;
use crate::event::EventId;
use crate::hash::{ContentId, PhotoHash};
use crate::identity::{CompanyPin, SessionId};
use crate::ledger::{LedgerOutcome, LedgerProof};

/// Lifecycle state of a session. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Everything captured for one side (entry or exit) of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
    pub photo_hash: PhotoHash,
    pub photo_url: String,
    pub storage_ref: ContentId,
    pub descriptor: Descriptor,
    pub ledger: LedgerOutcome,
    /// Event log entry recording this checkpoint.
    pub event_id: EventId,
}

/// One person's open-to-closed dwell interval at a facility.
///
/// Invariants upheld by the methods on this type:
/// - `exit` is present iff `status == Closed`
/// - `entry.timestamp < exit.timestamp` whenever both exist
/// - `match_confidence` is set exactly when `exit` is
/// - a closed session never reopens
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    session_id: SessionId,
    company_pin: CompanyPin,
    status: SessionStatus,
    entry: Checkpoint,
    exit: Option<Checkpoint>,
    match_confidence: Option<f64>,
}

impl Session {
    /// Create a new open session from its entry checkpoint.
    pub fn open(session_id: SessionId, company_pin: CompanyPin, entry: Checkpoint) -> Self {
        Self {
            session_id,
            company_pin,
            status: SessionStatus::Open,
            entry,
            exit: None,
            match_confidence: None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn company_pin(&self) -> &CompanyPin {
        &self.company_pin
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    pub fn entry(&self) -> &Checkpoint {
        &self.entry
    }

    pub fn exit(&self) -> Option<&Checkpoint> {
        self.exit.as_ref()
    }

    pub fn match_confidence(&self) -> Option<f64> {
        self.match_confidence
    }

    /// Transition open -> closed, recording the exit checkpoint.
    pub fn close(&mut self, exit: Checkpoint, match_distance: f64) -> Result<(), TypeError> {
        if !self.is_open() {
            return Err(TypeError::SessionClosed(self.session_id.to_string()));
        }
        if exit.timestamp <= self.entry.timestamp {
            return Err(TypeError::TimestampOrder);
        }
        self.match_confidence = Some(confidence_from_distance(match_distance));
        self.exit = Some(exit);
        self.status = SessionStatus::Closed;
        Ok(())
    }

    /// Attach ledger proof to an entry that was recorded while the ledger
    /// was unavailable. Pending -> Confirmed is the only change `entry`
    /// ever sees after creation.
    pub fn confirm_entry_ledger(&mut self, proof: LedgerProof) -> Result<(), TypeError> {
        if self.entry.ledger.is_confirmed() {
            return Err(TypeError::AlreadyConfirmed(self.session_id.to_string()));
        }
        self.entry.ledger = LedgerOutcome::Confirmed(proof);
        Ok(())
    }

    /// Check the structural invariants. Used by stores after deserializing.
    pub fn check_invariants(&self) -> Result<(), TypeError> {
        match (&self.status, &self.exit, self.match_confidence) {
            (SessionStatus::Open, None, None) => Ok(()),
            (SessionStatus::Closed, Some(exit), Some(_)) => {
                if exit.timestamp <= self.entry.timestamp {
                    Err(TypeError::TimestampOrder)
                } else {
                    Ok(())
                }
            }
            (SessionStatus::Closed, _, _) => Err(TypeError::InvalidIdentifier {
                kind: "session",
                reason: "closed session without exit data".into(),
            }),
            (SessionStatus::Open, _, _) => Err(TypeError::InvalidIdentifier {
                kind: "session",
                reason: "open session carries exit data".into(),
            }),
        }
    }
}

/// `max(0, 1 - distance)`, capped at 1.
pub fn confidence_from_distance(distance: f64) -> f64 {
    if !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}
