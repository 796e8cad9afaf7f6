//! Session and event-log storage for Sentinel.
//!
//! A session is opened by an entry and closed, at most once, by the exit
//! the [`Correlator`] matches to it. The [`SessionStore`] makes that close
//! conditional: it succeeds only while the session is still open, so two
//! concurrent exits can never both close the same session.
//!
//! - [`SessionStore`] -- sessions, the event log, and event-id allocation
//! - [`InMemorySessionStore`] -- single-lock store for tests and local runs
//! - [`Correlator`] -- nearest open session within the match threshold
//! - [`FacilityDirectory`] -- which facility PINs are allowed to record

pub mod correlator;
pub mod error;
pub mod facility;
pub mod memory;
pub mod traits;

pub use correlator::{Correlator, MatchResult, DEFAULT_MATCH_THRESHOLD};
pub use error::{SessionStoreError, SessionStoreResult};
pub use facility::{FacilityDirectory, InMemoryFacilityDirectory};
pub use memory::InMemorySessionStore;
pub use traits::{CloseOutcome, LedgerStatusSummary, SessionStore};
