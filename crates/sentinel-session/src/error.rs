use sentinel_types::{EventId, SessionId, TypeError};

/// Errors from session and event-log storage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("session already exists: {0}")]
    DuplicateSession(SessionId),

    #[error("event id already in use: {0}")]
    DuplicateEvent(EventId),

    /// A requested transition would break a session invariant.
    #[error("invalid session transition: {0}")]
    InvalidTransition(#[from] TypeError),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for session store operations.
pub type SessionStoreResult<T> = Result<T, SessionStoreError>;
