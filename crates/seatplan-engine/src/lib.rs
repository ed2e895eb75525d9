//! seatplan-engine — assignment runs for an exam year.
//!
//! Ties the pure planner in `seatplan-placement` to the state store:
//!
//! - Resolves each pending school's demand through a [`Roster`]
//! - Commits plans in one write transaction with re-validation ([`writer`])
//! - Turns what was committed into an [`AssignmentReport`]
//! - Supports dry-run previews, cancellation and run timeouts
//!
//! # Architecture
//!
//! ```text
//! AssignmentEngine
//!   ├── StateStore (snapshot read, assignment + skip log writes)
//!   ├── Roster (headcount per school)
//!   └── seatplan-placement (ledger, resolver, planner)
//! ```

pub mod cancel;
pub mod engine;
pub mod error;
pub mod report;
pub mod roster;
pub mod writer;

pub use cancel::CancelToken;
pub use engine::{AssignmentEngine, RunOptions};
pub use error::{EngineError, EngineResult, RosterError};
pub use report::{AssignmentReport, ReportedAssignment, ReportedSkip};
pub use roster::{Roster, StaticRoster, StoredRoster};
pub use writer::{CommitOutcome, CommittedSkip, commit};
