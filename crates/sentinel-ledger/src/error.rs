/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("stale nonce: ledger expects {expected}, call used {got}")]
    StaleNonce { expected: u64, got: u64 },

    #[error("ledger rejected the call: {0}")]
    Rejected(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger {stage} timed out after {after_ms} ms")]
    Timeout { stage: &'static str, after_ms: u64 },

    #[error("argument {field} is {actual} characters, limit is {max}")]
    ArgumentTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("invalid call signature")]
    InvalidSignature,

    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Whether resubmitting with fresh state can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleNonce { .. })
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_nonce_is_retryable() {
        assert!(LedgerError::StaleNonce { expected: 2, got: 1 }.is_retryable());
        assert!(!LedgerError::Timeout { stage: "broadcast", after_ms: 10 }.is_retryable());
        assert!(!LedgerError::Rejected("fee too low".into()).is_retryable());
    }

    #[test]
    fn timeout_message_names_stage() {
        let e = LedgerError::Timeout { stage: "nonce fetch", after_ms: 250 };
        assert_eq!(e.to_string(), "ledger nonce fetch timed out after 250 ms");
    }
}
