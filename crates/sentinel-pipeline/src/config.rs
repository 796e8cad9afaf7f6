use std::time::Duration;

use sentinel_session::DEFAULT_MATCH_THRESHOLD;

/// Tuning for the entry and exit flows.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Largest correlation distance accepted as a match (inclusive).
    pub match_threshold: f64,
    /// Most recent open sessions considered per exit.
    pub candidate_window: usize,
    /// Bound on one photo upload.
    pub upload_timeout: Duration,
    /// Bound on one ledger submission, nonce fetch and broadcast included.
    pub ledger_timeout: Duration,
    /// Resubmissions allowed after a stale nonce.
    pub max_nonce_retries: u32,
    /// Re-correlations allowed after losing a conditional close.
    pub max_close_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            candidate_window: 200,
            upload_timeout: Duration::from_secs(15),
            ledger_timeout: Duration::from_secs(20),
            max_nonce_retries: 3,
            max_close_retries: 3,
        }
    }
}
