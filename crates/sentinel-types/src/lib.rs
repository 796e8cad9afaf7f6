//! Foundation types for Sentinel.
//!
//! Every other Sentinel crate depends on `sentinel-types`. The types here
//! carry no I/O; they describe what the pipeline commits and what the
//! stores persist.
//!
//! # Key Types
//!
//! - [`Session`]: one person's open-to-closed dwell interval at a facility
//! - [`EventLogEntry`]: append-only audit record for a committed action
//! - [`Descriptor`]: fixed-length biometric embedding (128 components)
//! - [`PhotoHash`]: SHA-256 tamper-evidence hash of raw image bytes
//! - [`ContentId`]: provider-specific storage handle (never a `PhotoHash`)
//! - [`LedgerOutcome`]: `Confirmed` ledger proof or `Pending` with a reason

pub mod descriptor;
pub mod error;
pub mod event;
pub mod hash;
pub mod identity;
pub mod ledger;
pub mod session;

pub use descriptor::{euclidean_distance, Descriptor, DESCRIPTOR_LEN};
pub use error::TypeError;
pub use event::{EventId, EventLogEntry, EventType};
pub use hash::{ContentId, PhotoHash};
pub use identity::{CompanyPin, SessionId};
pub use ledger::{LedgerOutcome, LedgerProof};
pub use session::{confidence_from_distance, Checkpoint, Session, SessionStatus};
