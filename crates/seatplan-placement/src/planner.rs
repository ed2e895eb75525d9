//! Assignment planner — greedy, deterministic allocation of schools to centers.
//!
//! Schools are visited largest demand first (ties by ascending school id).
//! For each school the planner walks the affinity tiers and takes the
//! fitting center with the most remaining seats (ties by ascending center
//! id). A school nothing fits is recorded as a skip with its reason.
//!
//! Planning is a pure function of (schools, resolver, ledger): no I/O, and
//! the same inputs always yield the same plan.

use serde::Serialize;
use tracing::{debug, info};

use seatplan_state::{CenterId, ExamYearId, School, SchoolId, SkipReason, Tier};

use crate::affinity::{AffinityResolver, CandidateTiers};
use crate::ledger::CapacityLedger;

/// A school awaiting placement, with its demand for the exam year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolDemand {
    pub school: School,
    pub demand: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAssignment {
    pub school_id: SchoolId,
    pub center_id: CenterId,
    pub tier: Tier,
    pub demand: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedSkip {
    pub school_id: SchoolId,
    pub reason: SkipReason,
    pub demand: u32,
}

/// Planned outcome of a run, both lists in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentPlan {
    pub exam_year_id: ExamYearId,
    pub assignments: Vec<PlannedAssignment>,
    pub skips: Vec<PlannedSkip>,
}

impl AssignmentPlan {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty() && self.skips.is_empty()
    }
}

/// Sort into processing order: demand descending, then school id ascending.
pub fn order_schools(schools: &mut [SchoolDemand]) {
    schools.sort_by(|a, b| {
        b.demand
            .cmp(&a.demand)
            .then_with(|| a.school.id.cmp(&b.school.id))
    });
}

/// Plan every school, reserving seats in `ledger` as assignments are made.
pub fn plan_assignments(
    exam_year_id: ExamYearId,
    mut schools: Vec<SchoolDemand>,
    resolver: &AffinityResolver,
    ledger: &mut CapacityLedger,
) -> AssignmentPlan {
    order_schools(&mut schools);

    let mut plan = AssignmentPlan {
        exam_year_id,
        ..AssignmentPlan::default()
    };

    for SchoolDemand { school, demand } in &schools {
        let candidates = resolver.resolve(school);
        match place(&candidates, *demand, ledger) {
            Some((center_id, tier)) => {
                debug!(
                    school_id = school.id,
                    center_id,
                    ?tier,
                    demand,
                    "school planned"
                );
                plan.assignments.push(PlannedAssignment {
                    school_id: school.id,
                    center_id,
                    tier,
                    demand: *demand,
                });
            }
            None => {
                let reason = classify_skip(&candidates);
                debug!(school_id = school.id, %reason, demand, "school skipped");
                plan.skips.push(PlannedSkip {
                    school_id: school.id,
                    reason,
                    demand: *demand,
                });
            }
        }
    }

    info!(
        exam_year = exam_year_id,
        planned = plan.assignments.len(),
        skipped = plan.skips.len(),
        "assignment plan computed"
    );
    plan
}

/// Walk the tiers; reserve and return the first tier's winning center.
fn place(
    candidates: &CandidateTiers,
    demand: u32,
    ledger: &mut CapacityLedger,
) -> Option<(CenterId, Tier)> {
    for (tier, centers) in candidates.tiers() {
        if let Some(center_id) = select_center(centers, demand, ledger) {
            // Selection only returns centers that fit.
            if ledger.reserve(center_id, demand).is_ok() {
                return Some((center_id, tier));
            }
        }
    }
    None
}

/// Fitting center with the greatest remaining seats; ties go to the lowest id.
pub fn select_center(
    centers: &[CenterId],
    demand: u32,
    ledger: &CapacityLedger,
) -> Option<CenterId> {
    centers
        .iter()
        .filter_map(|&id| ledger.remaining(id).map(|remaining| (id, remaining)))
        .filter(|&(_, remaining)| remaining >= demand)
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(id, _)| id)
}

fn classify_skip(candidates: &CandidateTiers) -> SkipReason {
    if !candidates.located {
        SkipReason::NoRegionAssigned
    } else if candidates.is_empty() {
        SkipReason::NoActiveCenter
    } else {
        SkipReason::NoCapacity
    }
}
