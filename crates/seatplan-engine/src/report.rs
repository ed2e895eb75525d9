//! Run reports — what a run assigned and which schools it skipped.

use serde::{Deserialize, Serialize};

use seatplan_placement::AssignmentPlan;
use seatplan_state::{CenterId, ExamYearId, SchoolId, SkipReason, Tier};

use crate::writer::CommitOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedAssignment {
    pub school_id: SchoolId,
    pub center_id: CenterId,
    pub tier: Option<Tier>,
    pub seats: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedSkip {
    pub school_id: SchoolId,
    pub reason: SkipReason,
}

/// Summary of one assignment run, or of a preview when `dry_run` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub exam_year_id: ExamYearId,
    pub dry_run: bool,
    pub assigned_count: u32,
    /// Number of entries in `skips`.
    pub skipped_count: u32,
    /// Skips matching the skip log, left out of `skips` unless re-reported.
    pub known_skip_count: u32,
    pub conflict_count: u32,
    pub assignments: Vec<ReportedAssignment>,
    pub skips: Vec<ReportedSkip>,
}

impl AssignmentReport {
    /// Report of a committed run. Known skips appear in `skips` only when
    /// `include_known_skips` is set.
    pub fn from_commit(
        exam_year_id: ExamYearId,
        outcome: &CommitOutcome,
        include_known_skips: bool,
    ) -> Self {
        let assignments: Vec<ReportedAssignment> = outcome
            .committed
            .iter()
            .map(|a| ReportedAssignment {
                school_id: a.school_id,
                center_id: a.center_id,
                tier: a.tier,
                seats: a.seats,
            })
            .collect();

        let skips: Vec<ReportedSkip> = outcome
            .skips
            .iter()
            .filter(|s| include_known_skips || !s.known)
            .map(|s| ReportedSkip {
                school_id: s.school_id,
                reason: s.reason,
            })
            .collect();

        Self {
            exam_year_id,
            dry_run: false,
            assigned_count: count(assignments.len()),
            skipped_count: count(skips.len()),
            known_skip_count: count(outcome.skips.iter().filter(|s| s.known).count()),
            conflict_count: count(outcome.conflict_count()),
            assignments,
            skips,
        }
    }

    /// Report of an uncommitted plan. Every planned skip is listed.
    pub fn from_plan(plan: &AssignmentPlan) -> Self {
        let assignments: Vec<ReportedAssignment> = plan
            .assignments
            .iter()
            .map(|a| ReportedAssignment {
                school_id: a.school_id,
                center_id: a.center_id,
                tier: Some(a.tier),
                seats: a.demand,
            })
            .collect();
        let skips: Vec<ReportedSkip> = plan
            .skips
            .iter()
            .map(|s| ReportedSkip {
                school_id: s.school_id,
                reason: s.reason,
            })
            .collect();

        Self {
            exam_year_id: plan.exam_year_id,
            dry_run: true,
            assigned_count: count(assignments.len()),
            skipped_count: count(skips.len()),
            known_skip_count: 0,
            conflict_count: 0,
            assignments,
            skips,
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
