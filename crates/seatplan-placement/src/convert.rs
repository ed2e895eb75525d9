//! Conversions from the state store's year snapshot to planner inputs.
//!
//! Bridges `seatplan_state::YearSnapshot` to the [`CapacityLedger`],
//! [`AffinityResolver`] and the list of schools still awaiting a center.

use std::collections::HashSet;

use seatplan_state::{School, SchoolId, YearSnapshot};

use crate::affinity::AffinityResolver;
use crate::ledger::CapacityLedger;

/// Schools without an assignment for the snapshot's exam year, ascending id.
pub fn pending_schools(snapshot: &YearSnapshot) -> Vec<School> {
    let assigned: HashSet<SchoolId> = snapshot.assignments.iter().map(|a| a.school_id).collect();
    let mut pending: Vec<School> = snapshot
        .schools
        .iter()
        .filter(|s| !assigned.contains(&s.id))
        .cloned()
        .collect();
    pending.sort_by_key(|s| s.id);
    pending
}

/// Ledger seeded from the snapshot's centers and existing assignments.
pub fn ledger_from_snapshot(snapshot: &YearSnapshot) -> CapacityLedger {
    CapacityLedger::seed(&snapshot.centers, &snapshot.assignments)
}

pub fn resolver_from_snapshot(snapshot: &YearSnapshot) -> AffinityResolver {
    AffinityResolver::new(&snapshot.centers, &snapshot.clusters)
}
