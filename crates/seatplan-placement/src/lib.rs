//! seatplan-placement — capacity-constrained placement of schools.
//!
//! This crate decides where schools sit their exams. It performs no I/O:
//! callers hand it a snapshot of centers, schools and existing assignments
//! and it returns a plan that `seatplan-engine` commits.
//!
//! # Components
//!
//! - **`ledger`** — Remaining seats per active center for one run
//! - **`affinity`** — Candidate tiers per school (cluster, then region)
//! - **`planner`** — Greedy largest-first allocation with skip reasons
//! - **`convert`** — Planner inputs from a state store snapshot

pub mod affinity;
pub mod convert;
pub mod ledger;
pub mod planner;

pub use affinity::{AffinityResolver, CandidateTiers};
pub use convert::{ledger_from_snapshot, pending_schools, resolver_from_snapshot};
pub use ledger::{CapacityLedger, InsufficientCapacity};
pub use planner::{
    AssignmentPlan, PlannedAssignment, PlannedSkip, SchoolDemand, order_schools, plan_assignments,
    select_center,
};
