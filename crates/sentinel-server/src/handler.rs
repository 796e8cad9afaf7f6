use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sentinel_pipeline::CaptureRequest;
use sentinel_session::LedgerStatusSummary;
use sentinel_types::{CompanyPin, ContentId, EventId, EventLogEntry, LedgerOutcome, Session, SessionId};

use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

const DEFAULT_RECENT_SESSIONS: usize = 50;
const DEFAULT_SESSION_EVENTS: usize = 100;
const DEFAULT_RECENT_EVENTS: usize = 50;

/// Photos are immutable under their content id.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

/// JSON body of `POST /api/sessions/entry` and `POST /api/sessions/exit`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureBody {
    pub company_pin: String,
    pub descriptor: Vec<f64>,
    /// Base64 image, optionally as a `data:` URL.
    pub image: Option<String>,
}

impl CaptureBody {
    fn into_request(self) -> ServerResult<CaptureRequest> {
        let image = match self.image.as_deref() {
            Some(encoded) if !encoded.trim().is_empty() => decode_image(encoded)?,
            _ => return Err(ServerError::BadRequest("image is required".into())),
        };
        Ok(CaptureRequest {
            company_pin: self.company_pin,
            descriptor: self.descriptor,
            image,
        })
    }
}

/// Decode a base64 image, stripping a `data:image/...;base64,` prefix.
pub fn decode_image(encoded: &str) -> ServerResult<Bytes> {
    let payload = match encoded.split_once(";base64,") {
        Some((scheme, data)) if scheme.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| ServerError::BadRequest(format!("image is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(ServerError::BadRequest("image is empty".into()));
    }
    Ok(Bytes::from(bytes))
}

/// A receipt plus the flat `ledgerRef` callers key on.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptBody<'a, R: Serialize> {
    #[serde(flatten)]
    receipt: &'a R,
    ledger_ref: Option<&'a str>,
}

fn receipt_body<'a, R: Serialize>(receipt: &'a R, ledger: &'a LedgerOutcome) -> ReceiptBody<'a, R> {
    ReceiptBody {
        receipt,
        ledger_ref: ledger.tx_ref(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecentSessionsQuery {
    pub company_pin: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

fn bad_json(rejection: JsonRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}

fn bad_query(rejection: QueryRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}

fn clamp_limit(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max.max(1))
}

// ---------------------------------------------------------------------------
// Service metadata
// ---------------------------------------------------------------------------

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "sentinel-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Captures
// ---------------------------------------------------------------------------

pub async fn entry_handler(
    State(state): State<AppState>,
    payload: Result<Json<CaptureBody>, JsonRejection>,
) -> ServerResult<Response> {
    let Json(body) = payload.map_err(bad_json)?;
    let receipt = state.pipeline.record_entry(body.into_request()?).await?;
    Ok((StatusCode::CREATED, Json(receipt_body(&receipt, &receipt.ledger))).into_response())
}

/// 200 when the session closed, 202 when the ledger commit is pending and
/// the session is still open.
pub async fn exit_handler(
    State(state): State<AppState>,
    payload: Result<Json<CaptureBody>, JsonRejection>,
) -> ServerResult<Response> {
    let Json(body) = payload.map_err(bad_json)?;
    let receipt = state.pipeline.record_exit(body.into_request()?).await?;
    let status = if receipt.is_pending() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(receipt_body(&receipt, &receipt.ledger))).into_response())
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub async fn recent_sessions_handler(
    State(state): State<AppState>,
    query: Result<Query<RecentSessionsQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<Session>>> {
    let Query(query) = query.map_err(bad_query)?;
    let pin = query
        .company_pin
        .filter(|pin| !pin.is_empty())
        .map(|pin| CompanyPin::parse(&pin))
        .transpose()
        .map_err(|e| ServerError::BadRequest(format!("companyPin: {e}")))?;
    let limit = clamp_limit(query.limit, DEFAULT_RECENT_SESSIONS, state.recent_limit_max);
    let sessions = state
        .pipeline
        .sessions()
        .recent_sessions(pin.as_ref(), limit)
        .await?;
    Ok(Json(sessions))
}

pub async fn session_image_handler(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
) -> ServerResult<Response> {
    let id = ContentId::parse(&content_id)
        .map_err(|e| ServerError::BadRequest(format!("contentId: {e}")))?;
    let bytes = state
        .pipeline
        .objects()
        .fetch(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("image {id}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL),
        ],
        bytes,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

pub async fn session_events_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<EventLogEntry>>> {
    let Query(query) = query.map_err(bad_query)?;
    let id = SessionId::parse(&session_id)
        .map_err(|e| ServerError::BadRequest(format!("sessionId: {e}")))?;
    let limit = clamp_limit(query.limit, DEFAULT_SESSION_EVENTS, state.recent_limit_max);
    let events = state.pipeline.sessions().events_for_session(&id, limit).await?;
    Ok(Json(events))
}

pub async fn recent_events_handler(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<EventLogEntry>>> {
    let Query(query) = query.map_err(bad_query)?;
    let limit = clamp_limit(query.limit, DEFAULT_RECENT_EVENTS, state.recent_limit_max);
    Ok(Json(state.pipeline.sessions().recent_events(limit).await?))
}

pub async fn pending_events_handler(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<EventLogEntry>>> {
    let Query(query) = query.map_err(bad_query)?;
    let limit = clamp_limit(query.limit, state.recent_limit_max, state.recent_limit_max);
    Ok(Json(state.pipeline.sessions().pending_events(limit).await?))
}

pub async fn ledger_status_handler(
    State(state): State<AppState>,
) -> ServerResult<Json<LedgerStatusSummary>> {
    Ok(Json(state.pipeline.sessions().ledger_status().await?))
}

pub async fn retry_event_handler(
    State(state): State<AppState>,
    Path(event_id): Path<u64>,
) -> ServerResult<Json<EventLogEntry>> {
    let entry = state.pipeline.retry_pending(EventId::new(event_id)).await?;
    Ok(Json(entry))
}
