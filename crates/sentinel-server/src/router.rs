use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use sentinel_pipeline::EventPipeline;
use tower_http::trace::TraceLayer;

use crate::handler;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: EventPipeline,
    /// Upper bound for every `limit` query parameter.
    pub recent_limit_max: usize,
}

/// Build the axum router with all Sentinel endpoints.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/api/sessions/entry", post(handler::entry_handler))
        .route("/api/sessions/exit", post(handler::exit_handler))
        .route("/api/sessions/recent", get(handler::recent_sessions_handler))
        .route(
            "/api/sessions/image/:content_id",
            get(handler::session_image_handler),
        )
        .route(
            "/api/events/session/:session_id",
            get(handler::session_events_handler),
        )
        .route("/api/events/recent", get(handler::recent_events_handler))
        .route("/api/events/pending", get(handler::pending_events_handler))
        .route("/api/events/status", get(handler::ledger_status_handler))
        .route(
            "/api/events/:event_id/retry",
            post(handler::retry_event_handler),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
