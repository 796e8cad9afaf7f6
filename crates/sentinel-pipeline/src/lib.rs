//! Entry/exit orchestration for Sentinel.
//!
//! [`EventPipeline`] composes the object store, the ledger client, and the
//! session store into two flows:
//!
//! ```text
//! entry: Validating -> PhotoCommitted -> LedgerCommitted -> SessionPersisted -> Done
//! exit:  Validating -> PhotoCommitted -> Correlated -> LedgerCommitted -> SessionPersisted -> Done
//! ```
//!
//! Any stage may end in `Failed`. Failure policy:
//!
//! - validation and unknown facilities fail before any external call
//! - an object-store failure aborts with nothing persisted
//! - a ledger failure never aborts and never produces a substitute proof;
//!   the event is stored unprocessed and the receipt says `pending`
//! - an exit that loses the conditional close re-correlates against the
//!   refreshed open set
//!
//! Pending events are confirmed later with [`EventPipeline::retry_pending`].

pub mod config;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod stage;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Collaborators, EventPipeline};
pub use request::{CaptureRequest, EntryReceipt, EntryRequest, ExitReceipt, ExitRequest};
pub use stage::PipelineStage;
