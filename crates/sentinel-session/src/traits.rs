use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sentinel_types::{
    Checkpoint, CompanyPin, EventId, EventLogEntry, LedgerProof, Session, SessionId,
};

use crate::error::SessionStoreResult;

/// Result of a conditional close.
#[derive(Clone, Debug, PartialEq)]
pub enum CloseOutcome {
    /// The session was open and is now closed.
    Closed(Session),
    /// The session was no longer open; nothing was written.
    NotOpen,
}

/// Event-log totals by ledger state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatusSummary {
    pub total_events: u64,
    pub confirmed_events: u64,
    pub pending_events: u64,
}

/// Storage for sessions and their event log.
///
/// The only mutations a stored session ever sees are the conditional
/// open-to-closed transition and Pending-to-Confirmed on its entry ledger
/// state. Event log entries are append-only apart from their processing
/// state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: Session) -> SessionStoreResult<()>;

    async fn get_session(&self, id: &SessionId) -> SessionStoreResult<Option<Session>>;

    /// Open sessions for one facility, newest entry first, at most `limit`.
    async fn open_sessions(
        &self,
        pin: &CompanyPin,
        limit: usize,
    ) -> SessionStoreResult<Vec<Session>>;

    /// Close `id` only if it is still open at write time.
    async fn close_session(
        &self,
        id: &SessionId,
        exit: Checkpoint,
        match_distance: f64,
    ) -> SessionStoreResult<CloseOutcome>;

    /// Attach ledger proof to an entry recorded while the ledger was down.
    async fn confirm_entry_ledger(
        &self,
        id: &SessionId,
        proof: LedgerProof,
    ) -> SessionStoreResult<Session>;

    /// Sessions of any status, newest entry first, optionally scoped to a facility.
    async fn recent_sessions(
        &self,
        pin: Option<&CompanyPin>,
        limit: usize,
    ) -> SessionStoreResult<Vec<Session>>;

    /// Reserve an event id. `preferred` (usually ledger-assigned) is used
    /// when free; otherwise the next id after every known one.
    async fn allocate_event_id(&self, preferred: Option<EventId>) -> SessionStoreResult<EventId>;

    /// Drop a reservation whose event was never inserted. Returns `false`
    /// if `id` was not reserved.
    async fn release_event_id(&self, id: EventId) -> SessionStoreResult<bool>;

    async fn insert_event(&self, entry: EventLogEntry) -> SessionStoreResult<()>;

    async fn get_event(&self, id: EventId) -> SessionStoreResult<Option<EventLogEntry>>;

    /// Replace an existing entry, e.g. after a ledger retry.
    async fn update_event(&self, entry: EventLogEntry) -> SessionStoreResult<()>;

    /// Events for one session, newest first.
    async fn events_for_session(
        &self,
        id: &SessionId,
        limit: usize,
    ) -> SessionStoreResult<Vec<EventLogEntry>>;

    /// Most recent events across all sessions, newest first.
    async fn recent_events(&self, limit: usize) -> SessionStoreResult<Vec<EventLogEntry>>;

    /// Unprocessed events, oldest first.
    async fn pending_events(&self, limit: usize) -> SessionStoreResult<Vec<EventLogEntry>>;

    async fn ledger_status(&self) -> SessionStoreResult<LedgerStatusSummary>;
}
