use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sentinel_types::{
    Checkpoint, CompanyPin, EventId, EventLogEntry, LedgerProof, Session, SessionId,
};

use crate::error::{SessionStoreError, SessionStoreResult};
use crate::traits::{CloseOutcome, LedgerStatusSummary, SessionStore};

struct StoredSession {
    /// Insertion order; breaks ties between equal entry timestamps.
    seq: u64,
    session: Session,
}

#[derive(Default)]
struct StoreState {
    sessions: HashMap<SessionId, StoredSession>,
    next_seq: u64,
    events: BTreeMap<EventId, EventLogEntry>,
    reserved: BTreeSet<EventId>,
}

impl StoreState {
    fn sorted_sessions<'a>(
        &'a self,
        filter: impl Fn(&Session) -> bool,
        limit: usize,
    ) -> Vec<Session> {
        let mut matching: Vec<&'a StoredSession> = self
            .sessions
            .values()
            .filter(|s| filter(&s.session))
            .collect();
        matching.sort_by_key(|s| Reverse((s.session.entry().timestamp, s.seq)));
        matching
            .into_iter()
            .take(limit)
            .map(|s| s.session.clone())
            .collect()
    }

    fn newest_events(
        &self,
        filter: impl Fn(&EventLogEntry) -> bool,
        limit: usize,
    ) -> Vec<EventLogEntry> {
        let mut matching: Vec<&EventLogEntry> = self.events.values().filter(|e| filter(e)).collect();
        matching.sort_by_key(|e| Reverse((e.timestamp, e.event_id)));
        matching.into_iter().take(limit).cloned().collect()
    }
}

/// In-memory session store.
///
/// A single lock covers sessions and events, so the conditional close
/// observes and writes session status atomically.
pub struct InMemorySessionStore {
    inner: RwLock<StoreState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().map(|s| s.sessions.len()).unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.inner.read().map(|s| s.events.len()).unwrap_or(0)
    }

    fn read(&self) -> SessionStoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|_| SessionStoreError::Unavailable("session store read lock poisoned".into()))
    }

    fn write(&self) -> SessionStoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|_| SessionStoreError::Unavailable("session store write lock poisoned".into()))
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert_session(&self, session: Session) -> SessionStoreResult<()> {
        session.check_invariants()?;
        let mut state = self.write()?;
        if state.sessions.contains_key(session.session_id()) {
            return Err(SessionStoreError::DuplicateSession(session.session_id().clone()));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .sessions
            .insert(session.session_id().clone(), StoredSession { seq, session });
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> SessionStoreResult<Option<Session>> {
        Ok(self.read()?.sessions.get(id).map(|s| s.session.clone()))
    }

    async fn open_sessions(
        &self,
        pin: &CompanyPin,
        limit: usize,
    ) -> SessionStoreResult<Vec<Session>> {
        Ok(self
            .read()?
            .sorted_sessions(|s| s.is_open() && s.company_pin() == pin, limit))
    }

    async fn close_session(
        &self,
        id: &SessionId,
        exit: Checkpoint,
        match_distance: f64,
    ) -> SessionStoreResult<CloseOutcome> {
        let mut state = self.write()?;
        let stored = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::SessionNotFound(id.clone()))?;
        if !stored.session.is_open() {
            return Ok(CloseOutcome::NotOpen);
        }
        stored.session.close(exit, match_distance)?;
        Ok(CloseOutcome::Closed(stored.session.clone()))
    }

    async fn confirm_entry_ledger(
        &self,
        id: &SessionId,
        proof: LedgerProof,
    ) -> SessionStoreResult<Session> {
        let mut state = self.write()?;
        let stored = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::SessionNotFound(id.clone()))?;
        stored.session.confirm_entry_ledger(proof)?;
        Ok(stored.session.clone())
    }

    async fn recent_sessions(
        &self,
        pin: Option<&CompanyPin>,
        limit: usize,
    ) -> SessionStoreResult<Vec<Session>> {
        Ok(self
            .read()?
            .sorted_sessions(|s| pin.map_or(true, |p| s.company_pin() == p), limit))
    }

    async fn allocate_event_id(&self, preferred: Option<EventId>) -> SessionStoreResult<EventId> {
        let mut state = self.write()?;
        let taken = |id: &EventId| state.events.contains_key(id) || state.reserved.contains(id);
        let id = match preferred {
            Some(id) if !taken(&id) => id,
            _ => {
                let max_event = state.events.keys().next_back().copied();
                let max_reserved = state.reserved.iter().next_back().copied();
                max_event
                    .max(max_reserved)
                    .map_or(EventId::new(1), |max| max.next())
            }
        };
        if let Some(wanted) = preferred.filter(|p| *p != id) {
            tracing::debug!(%wanted, assigned = %id, "preferred event id taken, synthesized locally");
        }
        state.reserved.insert(id);
        Ok(id)
    }

    async fn release_event_id(&self, id: EventId) -> SessionStoreResult<bool> {
        Ok(self.write()?.reserved.remove(&id))
    }

    async fn insert_event(&self, entry: EventLogEntry) -> SessionStoreResult<()> {
        let mut state = self.write()?;
        if state.events.contains_key(&entry.event_id) {
            return Err(SessionStoreError::DuplicateEvent(entry.event_id));
        }
        state.reserved.remove(&entry.event_id);
        state.events.insert(entry.event_id, entry);
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> SessionStoreResult<Option<EventLogEntry>> {
        Ok(self.read()?.events.get(&id).cloned())
    }

    async fn update_event(&self, entry: EventLogEntry) -> SessionStoreResult<()> {
        let mut state = self.write()?;
        let slot = state
            .events
            .get_mut(&entry.event_id)
            .ok_or(SessionStoreError::EventNotFound(entry.event_id))?;
        *slot = entry;
        Ok(())
    }

    async fn events_for_session(
        &self,
        id: &SessionId,
        limit: usize,
    ) -> SessionStoreResult<Vec<EventLogEntry>> {
        Ok(self.read()?.newest_events(|e| &e.session_id == id, limit))
    }

    async fn recent_events(&self, limit: usize) -> SessionStoreResult<Vec<EventLogEntry>> {
        Ok(self.read()?.newest_events(|_| true, limit))
    }

    async fn pending_events(&self, limit: usize) -> SessionStoreResult<Vec<EventLogEntry>> {
        Ok(self
            .read()?
            .events
            .values()
            .filter(|e| e.is_pending())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ledger_status(&self) -> SessionStoreResult<LedgerStatusSummary> {
        let state = self.read()?;
        let total_events = state.events.len() as u64;
        let confirmed_events = state.events.values().filter(|e| e.processed).count() as u64;
        Ok(LedgerStatusSummary {
            total_events,
            confirmed_events,
            pending_events: total_events - confirmed_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use sentinel_types::{ContentId, Descriptor, EventType, LedgerOutcome, PhotoHash};

    use super::*;

    fn pin(s: &str) -> CompanyPin {
        CompanyPin::parse(s).unwrap()
    }

    fn checkpoint(at: DateTime<Utc>, event: u64) -> Checkpoint {
        Checkpoint {
            timestamp: at,
            photo_hash: PhotoHash::from_digest([event as u8; 32]),
            photo_url: format!("http://localhost:8080/ipfs/bm{event}"),
            storage_ref: ContentId::parse(&format!("bm{event}")).unwrap(),
            descriptor: Descriptor::zeros(),
            ledger: LedgerOutcome::pending("ledger offline"),
            event_id: EventId::new(event),
        }
    }

    fn session(facility: &str, at: DateTime<Utc>) -> Session {
        Session::open(SessionId::generate(), pin(facility), checkpoint(at, 1))
    }

    fn event(id: u64, session: &SessionId, at: DateTime<Utc>, processed: bool) -> EventLogEntry {
        let ledger = if processed {
            LedgerOutcome::Confirmed(LedgerProof {
                tx_ref: format!("0x{id:02x}"),
                block_ref: Some(id),
                event_id: None,
                timestamp: at,
            })
        } else {
            LedgerOutcome::pending("broadcast timed out")
        };
        EventLogEntry::from_outcome(
            EventId::new(id),
            session.clone(),
            EventType::Entry,
            at,
            PhotoHash::from_digest([0; 32]),
            "http://localhost:8080/ipfs/bm0".into(),
            ContentId::parse("bm0").unwrap(),
            Descriptor::zeros(),
            1.0,
            None,
            &ledger,
        )
    }

    #[tokio::test]
    async fn open_sessions_are_scoped_and_newest_first() {
        let store = InMemorySessionStore::new();
        let t0 = Utc::now();
        let older = session("ABC123", t0);
        let newer = session("ABC123", t0 + Duration::seconds(10));
        let elsewhere = session("XYZ999", t0 + Duration::seconds(20));
        for s in [older.clone(), newer.clone(), elsewhere] {
            store.insert_session(s).await.unwrap();
        }

        let open = store.open_sessions(&pin("ABC123"), 10).await.unwrap();
        let ids: Vec<_> = open.iter().map(|s| s.session_id().clone()).collect();
        assert_eq!(ids, vec![newer.session_id().clone(), older.session_id().clone()]);

        let capped = store.open_sessions(&pin("ABC123"), 1).await.unwrap();
        assert_eq!(capped[0].session_id(), newer.session_id());
    }

    #[tokio::test]
    async fn duplicate_session_is_rejected() {
        let store = InMemorySessionStore::new();
        let s = session("ABC123", Utc::now());
        store.insert_session(s.clone()).await.unwrap();
        assert_eq!(
            store.insert_session(s.clone()).await,
            Err(SessionStoreError::DuplicateSession(s.session_id().clone()))
        );
    }

    #[tokio::test]
    async fn close_is_conditional_on_open() {
        let store = InMemorySessionStore::new();
        let s = session("ABC123", Utc::now());
        let id = s.session_id().clone();
        store.insert_session(s.clone()).await.unwrap();

        let exit_at = s.entry().timestamp + Duration::seconds(30);
        let first = store.close_session(&id, checkpoint(exit_at, 2), 0.1).await.unwrap();
        assert!(matches!(first, CloseOutcome::Closed(ref closed) if !closed.is_open()));

        let second = store.close_session(&id, checkpoint(exit_at, 3), 0.0).await.unwrap();
        assert_eq!(second, CloseOutcome::NotOpen);

        let stored = store.get_session(&id).await.unwrap().unwrap();
        assert_eq!(stored.exit().unwrap().event_id, EventId::new(2));
        assert!(store.open_sessions(&pin("ABC123"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_unknown_session_is_not_found() {
        let store = InMemorySessionStore::new();
        let err = store
            .close_session(&SessionId::generate(), checkpoint(Utc::now(), 2), 0.1)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionStoreError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn confirm_entry_ledger_once() {
        let store = InMemorySessionStore::new();
        let s = session("ABC123", Utc::now());
        store.insert_session(s.clone()).await.unwrap();
        let proof = LedgerProof {
            tx_ref: "0xabc".into(),
            block_ref: Some(3),
            event_id: None,
            timestamp: Utc::now(),
        };
        let updated = store
            .confirm_entry_ledger(s.session_id(), proof.clone())
            .await
            .unwrap();
        assert_eq!(updated.entry().ledger.tx_ref(), Some("0xabc"));
        let err = store.confirm_entry_ledger(s.session_id(), proof).await.unwrap_err();
        assert!(matches!(err, SessionStoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn event_ids_prefer_ledger_then_synthesize() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.allocate_event_id(None).await.unwrap(), EventId::new(1));
        assert_eq!(
            store.allocate_event_id(Some(EventId::new(7))).await.unwrap(),
            EventId::new(7)
        );
        // 7 is reserved, so a second request for it gets max + 1.
        assert_eq!(
            store.allocate_event_id(Some(EventId::new(7))).await.unwrap(),
            EventId::new(8)
        );
        assert_eq!(store.allocate_event_id(None).await.unwrap(), EventId::new(9));
    }

    #[tokio::test]
    async fn released_ids_are_reused() {
        let store = InMemorySessionStore::new();
        let first = store.allocate_event_id(None).await.unwrap();
        let second = store.allocate_event_id(None).await.unwrap();
        assert_eq!(second, EventId::new(2));

        assert!(store.release_event_id(second).await.unwrap());
        assert!(!store.release_event_id(second).await.unwrap());
        assert_eq!(store.allocate_event_id(None).await.unwrap(), second);

        assert!(store.release_event_id(first).await.unwrap());
        assert_eq!(store.allocate_event_id(Some(first)).await.unwrap(), first);
    }

    #[tokio::test]
    async fn events_query_and_summary() {
        let store = InMemorySessionStore::new();
        let sid = SessionId::generate();
        let other = SessionId::generate();
        let t0 = Utc::now();
        store.insert_event(event(1, &sid, t0, true)).await.unwrap();
        store.insert_event(event(2, &sid, t0 + Duration::seconds(5), false)).await.unwrap();
        store.insert_event(event(3, &other, t0 + Duration::seconds(9), true)).await.unwrap();

        let mine = store.events_for_session(&sid, 100).await.unwrap();
        assert_eq!(
            mine.iter().map(|e| e.event_id.value()).collect::<Vec<_>>(),
            vec![2, 1]
        );
        let recent = store.recent_events(2).await.unwrap();
        assert_eq!(recent[0].event_id, EventId::new(3));
        assert_eq!(recent.len(), 2);

        let pending = store.pending_events(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, EventId::new(2));

        assert_eq!(
            store.ledger_status().await.unwrap(),
            LedgerStatusSummary {
                total_events: 3,
                confirmed_events: 2,
                pending_events: 1
            }
        );
    }

    #[tokio::test]
    async fn duplicate_event_and_missing_update() {
        let store = InMemorySessionStore::new();
        let sid = SessionId::generate();
        store.insert_event(event(4, &sid, Utc::now(), true)).await.unwrap();
        assert_eq!(
            store.insert_event(event(4, &sid, Utc::now(), true)).await,
            Err(SessionStoreError::DuplicateEvent(EventId::new(4)))
        );
        assert_eq!(
            store.update_event(event(5, &sid, Utc::now(), true)).await,
            Err(SessionStoreError::EventNotFound(EventId::new(5)))
        );
    }

    #[tokio::test]
    async fn recent_sessions_optionally_scoped() {
        let store = InMemorySessionStore::new();
        let t0 = Utc::now();
        store.insert_session(session("ABC123", t0)).await.unwrap();
        store.insert_session(session("XYZ999", t0 + Duration::seconds(1))).await.unwrap();
        assert_eq!(store.recent_sessions(None, 10).await.unwrap().len(), 2);
        let scoped = store.recent_sessions(Some(&pin("XYZ999")), 10).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].company_pin().as_str(), "XYZ999");
    }
}
