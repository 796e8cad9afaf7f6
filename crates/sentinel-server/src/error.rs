use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use sentinel_pipeline::PipelineError;
use sentinel_session::SessionStoreError;
use sentinel_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("session store error: {0}")]
    Session(#[from] SessionStoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Machine-readable kind carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pipeline(e) => e.kind(),
            Self::BadRequest(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Store(_) => "upstream_error",
            Self::Session(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Pipeline(e) => match e {
                PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
                PipelineError::Auth(_) => StatusCode::UNAUTHORIZED,
                PipelineError::NotFound { .. } | PipelineError::UnknownEvent(_) => {
                    StatusCode::NOT_FOUND
                }
                PipelineError::Conflict(_) => StatusCode::CONFLICT,
                PipelineError::Ledger(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Upstream(_) | PipelineError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Session(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();
        // Internal details stay in the log.
        let message = if kind == "internal_error" {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({ "error": kind, "message": message });
        if let Self::Pipeline(PipelineError::NotFound {
            best_distance,
            storage_ref,
        }) = &self
        {
            // JSON has no infinity; "no candidates" is null.
            body["bestDistance"] = if best_distance.is_finite() {
                json!(best_distance)
            } else {
                Value::Null
            };
            if let Some(storage_ref) = storage_ref {
                body["storageRef"] = json!(storage_ref.as_str());
            }
        }
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
