use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sentinel_crypto::{photo_hash, SigningKey};
use sentinel_ledger::LedgerClient;
use sentinel_session::{CloseOutcome, Correlator, FacilityDirectory, MatchResult, SessionStore};
use sentinel_store::{ObjectStore, StoredPhoto};
use sentinel_types::{
    confidence_from_distance, Checkpoint, CompanyPin, Descriptor, EventId, EventLogEntry,
    EventType, LedgerOutcome, LedgerProof, PhotoHash, Session, SessionId, SessionStatus,
};
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::request::{CaptureRequest, EntryReceipt, ExitReceipt};
use crate::stage::{FlowTrace, PipelineStage};

// ---------------------------------------------------------------------------
// EventPipeline
// ---------------------------------------------------------------------------

/// External systems the pipeline commits to.
pub struct Collaborators {
    pub objects: Arc<dyn ObjectStore>,
    pub ledger: Arc<dyn LedgerClient>,
    pub sessions: Arc<dyn SessionStore>,
    pub facilities: Arc<dyn FacilityDirectory>,
}

struct Inner {
    deps: Collaborators,
    signing_key: SigningKey,
    correlator: Correlator,
    config: PipelineConfig,
}

/// Orchestrates the entry and exit flows across the object store, the
/// ledger, and the session store.
///
/// Entry: validate -> upload photo -> ledger -> open session + ENTRY event.
/// Exit: validate -> upload photo -> correlate -> ledger -> conditional
/// close + EXIT event.
///
/// Each flow runs on its own task: dropping the caller's future does not
/// abort a flow that has already started committing.
#[derive(Clone)]
pub struct EventPipeline {
    inner: Arc<Inner>,
}

impl EventPipeline {
    pub fn new(deps: Collaborators, signing_key: SigningKey, config: PipelineConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                signing_key,
                correlator: Correlator::new(config.match_threshold),
                config,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.inner.deps.sessions
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.deps.objects
    }

    /// Ledger account the pipeline submits from.
    pub fn sender_address(&self) -> String {
        self.inner.signing_key.sender_address()
    }

    /// Record an entry and open a new session.
    pub async fn record_entry(&self, request: CaptureRequest) -> PipelineResult<EntryReceipt> {
        let span = tracing::info_span!("entry", pin = %request.company_pin);
        let this = self.clone();
        detach(async move { this.run_entry(request).await }.instrument(span)).await
    }

    /// Record an exit and close the open session it matches.
    pub async fn record_exit(&self, request: CaptureRequest) -> PipelineResult<ExitReceipt> {
        let span = tracing::info_span!("exit", pin = %request.company_pin);
        let this = self.clone();
        detach(async move { this.run_exit(request).await }.instrument(span)).await
    }

    /// Resubmit the ledger commit of an unprocessed event.
    ///
    /// A confirmed ENTRY moves its session's entry ledger state to
    /// `Confirmed`. A confirmed EXIT closes its session with the exit data
    /// captured originally, provided the session is still open.
    pub async fn retry_pending(&self, event_id: EventId) -> PipelineResult<EventLogEntry> {
        let span = tracing::info_span!("retry", %event_id);
        let this = self.clone();
        detach(async move { this.run_retry(event_id).await }.instrument(span)).await
    }

    // -----------------------------------------------------------------------
    // Flows
    // -----------------------------------------------------------------------

    async fn run_entry(&self, request: CaptureRequest) -> PipelineResult<EntryReceipt> {
        let mut trace = FlowTrace::start();
        let result = self.entry_flow(request, &mut trace).await;
        match &result {
            Ok(receipt) => {
                trace.advance(PipelineStage::Done);
                tracing::info!(
                    session_id = %receipt.session_id,
                    event_id = %receipt.event_id,
                    pending = receipt.is_pending(),
                    elapsed_ms = trace.elapsed().as_millis() as u64,
                    "entry recorded"
                );
            }
            Err(err) => trace.fail(err),
        }
        result
    }

    async fn entry_flow(
        &self,
        request: CaptureRequest,
        trace: &mut FlowTrace,
    ) -> PipelineResult<EntryReceipt> {
        let (pin, descriptor) = self.validate(&request).await?;

        let photo = self.commit_photo(EventType::Entry, request.image.clone()).await?;
        let hash = photo_hash(&request.image);
        trace.advance(PipelineStage::PhotoCommitted);

        let session_id = SessionId::generate();
        let ledger = self.commit_ledger(&session_id, EventType::Entry, &hash).await;
        trace.advance(PipelineStage::LedgerCommitted);

        let sessions = &self.inner.deps.sessions;
        let timestamp = Utc::now();
        let event_id = sessions.allocate_event_id(ledger_event_id(&ledger)).await?;
        let session = Session::open(
            session_id.clone(),
            pin,
            Checkpoint {
                timestamp,
                photo_hash: hash,
                photo_url: photo.url.clone(),
                storage_ref: photo.content_id.clone(),
                descriptor: descriptor.clone(),
                ledger: ledger.clone(),
                event_id,
            },
        );
        let event = EventLogEntry::from_outcome(
            event_id,
            session_id.clone(),
            EventType::Entry,
            timestamp,
            hash,
            photo.url.clone(),
            photo.content_id.clone(),
            descriptor,
            1.0,
            None,
            &ledger,
        );
        self.consume_event_id(event_id, async {
            sessions.insert_session(session).await?;
            sessions.insert_event(event).await?;
            Ok::<_, PipelineError>(())
        })
        .await?;
        trace.advance(PipelineStage::SessionPersisted);

        Ok(EntryReceipt {
            session_id,
            event_id,
            photo_hash: hash,
            storage_ref: photo.content_id,
            photo_url: photo.url,
            ledger,
            timestamp,
        })
    }

    async fn run_exit(&self, request: CaptureRequest) -> PipelineResult<ExitReceipt> {
        let mut trace = FlowTrace::start();
        let result = self.exit_flow(request, &mut trace).await;
        match &result {
            Ok(receipt) => {
                trace.advance(PipelineStage::Done);
                tracing::info!(
                    session_id = %receipt.session_id,
                    event_id = %receipt.event_id,
                    match_distance = receipt.match_distance,
                    pending = receipt.is_pending(),
                    stages = ?trace.history(),
                    elapsed_ms = trace.elapsed().as_millis() as u64,
                    "exit recorded"
                );
            }
            Err(err) => trace.fail(err),
        }
        result
    }

    async fn exit_flow(
        &self,
        request: CaptureRequest,
        trace: &mut FlowTrace,
    ) -> PipelineResult<ExitReceipt> {
        let (pin, descriptor) = self.validate(&request).await?;

        // Uploaded before correlation so an unmatched exit still leaves a trail.
        let photo = self.commit_photo(EventType::Exit, request.image.clone()).await?;
        let hash = photo_hash(&request.image);
        trace.advance(PipelineStage::PhotoCommitted);

        let sessions = &self.inner.deps.sessions;
        let window = self.inner.config.candidate_window;
        let max_attempts = self.inner.config.max_close_retries + 1;

        for attempt in 1..=max_attempts {
            let open = sessions.open_sessions(&pin, window).await?;
            let (session, distance) =
                match self.inner.correlator.find_best_match(&pin, &descriptor, &open) {
                    MatchResult::Matched { session, distance } => (session, distance),
                    MatchResult::NoMatch { best_distance } => {
                        return Err(self.orphaned(&photo, best_distance, open.len()));
                    }
                };
            trace.advance(PipelineStage::Correlated);
            tracing::debug!(session_id = %session.session_id(), distance, attempt, "exit correlated");

            let ledger = self
                .commit_ledger(session.session_id(), EventType::Exit, &hash)
                .await;
            trace.advance(PipelineStage::LedgerCommitted);

            let timestamp = exit_timestamp(session.entry().timestamp);
            let event_id = sessions.allocate_event_id(ledger_event_id(&ledger)).await?;
            let mut event = EventLogEntry::from_outcome(
                event_id,
                session.session_id().clone(),
                EventType::Exit,
                timestamp,
                hash,
                photo.url.clone(),
                photo.content_id.clone(),
                descriptor.clone(),
                confidence_from_distance(distance),
                Some(distance),
                &ledger,
            );
            let receipt = |ledger: LedgerOutcome, session_status| ExitReceipt {
                session_id: session.session_id().clone(),
                event_id,
                photo_hash: hash,
                storage_ref: photo.content_id.clone(),
                photo_url: photo.url.clone(),
                ledger,
                match_distance: distance,
                match_confidence: confidence_from_distance(distance),
                session_status,
                timestamp,
            };

            if !ledger.is_confirmed() {
                // Ledger proof must precede the close: keep the session open
                // and leave the EXIT event for an explicit retry.
                self.consume_event_id(event_id, async {
                    sessions.insert_event(event).await?;
                    Ok::<_, PipelineError>(())
                })
                .await?;
                trace.advance(PipelineStage::SessionPersisted);
                return Ok(receipt(ledger, SessionStatus::Open));
            }

            let checkpoint = Checkpoint {
                timestamp,
                photo_hash: hash,
                photo_url: photo.url.clone(),
                storage_ref: photo.content_id.clone(),
                descriptor: descriptor.clone(),
                ledger: ledger.clone(),
                event_id,
            };
            let tx_ref = ledger.tx_ref().unwrap_or_default().to_string();
            // A lost close still consumes the event id: the EXIT tx is on the
            // ledger, so it is logged against the session it was meant for.
            let closed = self
                .consume_event_id(event_id, async {
                    let outcome = sessions
                        .close_session(session.session_id(), checkpoint, distance)
                        .await?;
                    let closed = matches!(outcome, CloseOutcome::Closed(_));
                    if !closed {
                        event.mark_failed(format!(
                            "session {} was closed by a concurrent exit; ledger tx {tx_ref} is unattached",
                            session.session_id()
                        ));
                    }
                    sessions.insert_event(event).await?;
                    Ok::<_, PipelineError>(closed)
                })
                .await?;

            if closed {
                trace.advance(PipelineStage::SessionPersisted);
                return Ok(receipt(ledger, SessionStatus::Closed));
            }
            tracing::warn!(
                session_id = %session.session_id(),
                %event_id,
                %tx_ref,
                attempt,
                "session closed by a concurrent exit, unattached tx logged; re-correlating"
            );
        }

        // Out of close attempts: report what the open set looks like now.
        let open = sessions.open_sessions(&pin, window).await?;
        match self.inner.correlator.find_best_match(&pin, &descriptor, &open) {
            MatchResult::NoMatch { best_distance } => {
                Err(self.orphaned(&photo, best_distance, open.len()))
            }
            MatchResult::Matched { session, distance } => {
                tracing::warn!(
                    session_id = %session.session_id(),
                    distance,
                    storage_ref = %photo.content_id,
                    "exit still contended after {max_attempts} close attempts"
                );
                Err(PipelineError::Conflict(format!(
                    "exit still contended after {max_attempts} close attempts (session {}); photo {} retained",
                    session.session_id(),
                    photo.content_id
                )))
            }
        }
    }

    async fn run_retry(&self, event_id: EventId) -> PipelineResult<EventLogEntry> {
        let sessions = &self.inner.deps.sessions;
        let mut event = sessions
            .get_event(event_id)
            .await?
            .ok_or(PipelineError::UnknownEvent(event_id))?;
        if event.processed {
            return Err(PipelineError::Validation(format!(
                "event {event_id} is already processed"
            )));
        }

        if event.event_type == EventType::Exit {
            let session = sessions.get_session(&event.session_id).await?.ok_or_else(|| {
                PipelineError::Internal(format!("exit event {event_id} has no session"))
            })?;
            if !session.is_open() {
                let reason = format!(
                    "session {} was closed by another exit; exit not resubmitted",
                    event.session_id
                );
                event.mark_failed(reason.clone());
                sessions.update_event(event).await?;
                return Err(PipelineError::Conflict(reason));
            }
        }

        let proof = match self
            .submit_ledger(&event.session_id, event.event_type, &event.photo_hash)
            .await
        {
            Ok(proof) => proof,
            Err(reason) => {
                event.mark_failed(reason.clone());
                sessions.update_event(event).await?;
                return Err(PipelineError::Ledger(reason));
            }
        };

        match event.event_type {
            EventType::Entry => {
                sessions
                    .confirm_entry_ledger(&event.session_id, proof.clone())
                    .await?;
            }
            EventType::Exit => {
                let distance = event.match_distance.ok_or_else(|| {
                    PipelineError::Internal(format!("exit event {event_id} has no match distance"))
                })?;
                let checkpoint = Checkpoint {
                    timestamp: event.timestamp,
                    photo_hash: event.photo_hash,
                    photo_url: event.photo_url.clone(),
                    storage_ref: event.photo_storage_ref.clone(),
                    descriptor: event.descriptor.clone(),
                    ledger: LedgerOutcome::Confirmed(proof.clone()),
                    event_id,
                };
                let outcome = sessions
                    .close_session(&event.session_id, checkpoint, distance)
                    .await?;
                if outcome == CloseOutcome::NotOpen {
                    let reason = format!(
                        "session {} was closed by another exit; ledger tx {} is unattached",
                        event.session_id, proof.tx_ref
                    );
                    event.mark_failed(reason.clone());
                    sessions.update_event(event).await?;
                    tracing::warn!(%event_id, "pending exit conflicts with a later close");
                    return Err(PipelineError::Conflict(reason));
                }
            }
        }

        event.confirm(&proof);
        sessions.update_event(event.clone()).await?;
        tracing::info!(%event_id, tx_ref = %proof.tx_ref, "pending event confirmed");
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    async fn validate(&self, request: &CaptureRequest) -> PipelineResult<(CompanyPin, Descriptor)> {
        let pin = CompanyPin::parse(&request.company_pin)
            .map_err(|e| PipelineError::Validation(format!("companyPin: {e}")))?;
        if request.descriptor.is_empty() {
            return Err(PipelineError::Validation("descriptor is required".into()));
        }
        let descriptor = Descriptor::try_from(request.descriptor.clone())
            .map_err(|e| PipelineError::Validation(format!("descriptor: {e}")))?;
        if request.image.is_empty() {
            return Err(PipelineError::Validation("image is required".into()));
        }
        if !self.inner.deps.facilities.is_known(&pin).await? {
            return Err(PipelineError::Auth(pin.to_string()));
        }
        Ok((pin, descriptor))
    }

    async fn commit_photo(&self, kind: EventType, image: Bytes) -> PipelineResult<StoredPhoto> {
        let filename = format!("{}_{}.jpg", kind.file_prefix(), Utc::now().timestamp_millis());
        let limit = self.inner.config.upload_timeout;
        match tokio::time::timeout(limit, self.inner.deps.objects.upload(image, &filename)).await {
            Ok(Ok(photo)) => {
                tracing::debug!(content_id = %photo.content_id, size = photo.size, "photo committed");
                Ok(photo)
            }
            Ok(Err(e)) => Err(PipelineError::Upstream(e.to_string())),
            Err(_) => Err(PipelineError::Upstream(format!(
                "photo upload timed out after {} ms",
                limit.as_millis()
            ))),
        }
    }

    async fn commit_ledger(
        &self,
        session_id: &SessionId,
        event_type: EventType,
        hash: &PhotoHash,
    ) -> LedgerOutcome {
        match self.submit_ledger(session_id, event_type, hash).await {
            Ok(proof) => LedgerOutcome::Confirmed(proof),
            Err(reason) => LedgerOutcome::pending(reason),
        }
    }

    /// One bounded ledger submission, resubmitted only on a stale nonce.
    async fn submit_ledger(
        &self,
        session_id: &SessionId,
        event_type: EventType,
        hash: &PhotoHash,
    ) -> Result<LedgerProof, String> {
        let limit = self.inner.config.ledger_timeout;
        let mut retries = 0;
        loop {
            let call = self
                .inner
                .deps
                .ledger
                .log_event(session_id, event_type, hash, &self.inner.signing_key);
            let reason = match tokio::time::timeout(limit, call).await {
                Ok(Ok(proof)) => {
                    tracing::debug!(tx_ref = %proof.tx_ref, "ledger commit confirmed");
                    return Ok(proof);
                }
                Ok(Err(e)) if e.is_retryable() && retries < self.inner.config.max_nonce_retries => {
                    retries += 1;
                    tracing::debug!(retries, error = %e, "stale nonce, resubmitting");
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("ledger commit timed out after {} ms", limit.as_millis()),
            };
            tracing::warn!(%session_id, %event_type, %reason, "ledger unavailable, event left pending");
            return Err(reason);
        }
    }

    /// Await the writes that consume a reserved `event_id`, releasing the
    /// reservation if they fail.
    async fn consume_event_id<T>(
        &self,
        event_id: EventId,
        writes: impl Future<Output = PipelineResult<T>>,
    ) -> PipelineResult<T> {
        let result = writes.await;
        if result.is_err() {
            match self.inner.deps.sessions.release_event_id(event_id).await {
                Ok(_) => tracing::debug!(%event_id, "event id released after failed write"),
                Err(e) => tracing::warn!(%event_id, error = %e, "event id could not be released"),
            }
        }
        result
    }

    fn orphaned(&self, photo: &StoredPhoto, best_distance: f64, candidates: usize) -> PipelineError {
        tracing::info!(
            storage_ref = %photo.content_id,
            best_distance,
            candidates,
            "no open session matched; exit photo retained unattached"
        );
        PipelineError::NotFound {
            best_distance,
            storage_ref: Some(photo.content_id.clone()),
        }
    }
}

/// Run `flow` on its own task so caller cancellation cannot interrupt it.
async fn detach<T: Send + 'static>(
    flow: impl Future<Output = PipelineResult<T>> + Send + 'static,
) -> PipelineResult<T> {
    tokio::spawn(flow)
        .await
        .map_err(|e| PipelineError::Internal(format!("pipeline task failed: {e}")))?
}

fn ledger_event_id(ledger: &LedgerOutcome) -> Option<EventId> {
    ledger.proof().and_then(|p| p.event_id)
}

/// Now, but never at or before the entry it closes.
fn exit_timestamp(entry: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(entry + ChronoDuration::milliseconds(1))
}
