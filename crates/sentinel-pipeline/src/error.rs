use sentinel_session::SessionStoreError;
use sentinel_types::{ContentId, EventId};

/// Errors surfaced by the entry, exit, and retry flows.
///
/// Ledger failures during entry and exit never appear here: they degrade to
/// a pending receipt. `Ledger` is only returned by an explicit retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unknown facility: {0}")]
    Auth(String),

    /// No open session within the match threshold. The exit photo has
    /// already been stored and is kept as `storage_ref`.
    #[error("no open session matched (best distance {best_distance})")]
    NotFound {
        best_distance: f64,
        storage_ref: Option<ContentId>,
    },

    #[error("event not found: {0}")]
    UnknownEvent(EventId),

    #[error("object store failed: {0}")]
    Upstream(String),

    #[error("ledger commit failed: {0}")]
    Ledger(String),

    /// An exit that lost its session to another exit: a pending retry, or a
    /// capture still contended once close attempts run out.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Auth(_) => "auth_error",
            Self::NotFound { .. } | Self::UnknownEvent(_) => "not_found",
            Self::Upstream(_) => "upstream_error",
            Self::Ledger(_) => "ledger_error",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<SessionStoreError> for PipelineError {
    fn from(err: SessionStoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
