use thiserror::Error;

/// Errors produced by type construction and state transitions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("descriptor must have {expected} components, got {actual}")]
    DescriptorLength { expected: usize, actual: usize },

    #[error("descriptor component {index} is not finite")]
    NonFiniteComponent { index: usize },

    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier { kind: &'static str, reason: String },

    #[error("session {0} is already closed")]
    SessionClosed(String),

    #[error("exit timestamp must be strictly after entry timestamp")]
    TimestampOrder,

    #[error("entry ledger state for session {0} is already confirmed")]
    AlreadyConfirmed(String),
}
