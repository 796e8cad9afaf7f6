use std::fmt;
use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Where a flow is in the commit sequence.
///
/// `Correlated` is only visited by exits. `Failed` is reachable from any
/// stage and is terminal, as is `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Validating,
    PhotoCommitted,
    Correlated,
    LedgerCommitted,
    SessionPersisted,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::PhotoCommitted => "photo_committed",
            Self::Correlated => "correlated",
            Self::LedgerCommitted => "ledger_committed",
            Self::SessionPersisted => "session_persisted",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stage bookkeeping for one flow. Every transition is logged at DEBUG.
#[derive(Debug)]
pub(crate) struct FlowTrace {
    stage: PipelineStage,
    history: Vec<PipelineStage>,
    started: Instant,
}

impl FlowTrace {
    pub(crate) fn start() -> Self {
        tracing::debug!(stage = ?PipelineStage::Validating, "flow started");
        Self {
            stage: PipelineStage::Validating,
            history: vec![PipelineStage::Validating],
            started: Instant::now(),
        }
    }

    pub(crate) fn advance(&mut self, next: PipelineStage) {
        tracing::debug!(from = ?self.stage, stage = ?next, "stage transition");
        self.stage = next;
        self.history.push(next);
    }

    pub(crate) fn fail(&mut self, err: &PipelineError) {
        tracing::debug!(from = ?self.stage, stage = ?PipelineStage::Failed, kind = err.kind(), error = %err, "flow failed");
        self.stage = PipelineStage::Failed;
        self.history.push(PipelineStage::Failed);
    }

    #[cfg(test)]
    pub(crate) fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub(crate) fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
