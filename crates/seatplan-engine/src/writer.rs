//! Assignment writer — commits a plan inside one store write transaction.
//!
//! redb admits a single writer at a time, so two runs never interleave
//! their commits. Each planned row is still re-validated against what the
//! transaction sees, because the plan may have been computed from a
//! snapshot that another run has since changed:
//!
//! - the school must still lack an assignment for the year
//! - the center must exist and be active
//! - `capacity − used ≥ seats`, with `used` counted from committed rows
//!   plus rows written earlier in this commit
//!
//! A row that fails becomes a `conflict_detected` skip; the batch goes on.
//! Skips are only logged for schools that are still unassigned when the
//! transaction commits.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use seatplan_placement::{AssignmentPlan, PlannedAssignment, PlannedSkip};
use seatplan_state::{
    Assignment, AssignmentSource, CenterId, ExamCenter, ExamYearId, SchoolId, SkipReason,
    SkipRecord, StateStore, StoreTxn, epoch_secs,
};

use crate::cancel::CancelToken;
use crate::error::{EngineError, EngineResult};

/// A skip as the writer classified it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedSkip {
    pub school_id: SchoolId,
    pub reason: SkipReason,
    pub demand: u32,
    /// The skip log already held this reason and demand.
    pub known: bool,
}

/// What a commit actually wrote.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub committed: Vec<Assignment>,
    /// Planned skips first, then conflicts, each in processing order.
    pub skips: Vec<CommittedSkip>,
}

impl CommitOutcome {
    pub fn conflict_count(&self) -> usize {
        self.skips
            .iter()
            .filter(|s| s.reason == SkipReason::ConflictDetected)
            .count()
    }
}

/// Why a planned row could not be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conflict {
    AlreadyAssigned { center_id: CenterId },
    CenterMissing,
    CenterInactive,
    Insufficient { remaining: u32 },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyAssigned { center_id } => {
                write!(f, "school already assigned to center {center_id}")
            }
            Self::CenterMissing => f.write_str("center no longer exists"),
            Self::CenterInactive => f.write_str("center is inactive"),
            Self::Insufficient { remaining } => write!(f, "only {remaining} seats remain"),
        }
    }
}

/// Seat usage and center rows as seen by one write transaction.
struct TxnView {
    used: HashMap<CenterId, u32>,
    centers: HashMap<CenterId, Option<ExamCenter>>,
}

impl TxnView {
    fn load(txn: &StoreTxn, plan: &AssignmentPlan) -> EngineResult<Self> {
        let mut used: HashMap<CenterId, u32> = HashMap::new();
        for a in txn.list_assignments(plan.exam_year_id)? {
            let entry = used.entry(a.center_id).or_default();
            *entry = entry.saturating_add(a.seats);
        }
        Ok(Self {
            used,
            centers: HashMap::new(),
        })
    }

    fn check(
        &mut self,
        txn: &StoreTxn,
        year: ExamYearId,
        row: &PlannedAssignment,
    ) -> EngineResult<Result<(), Conflict>> {
        if let Some(existing) = txn.get_assignment(year, row.school_id)? {
            return Ok(Err(Conflict::AlreadyAssigned {
                center_id: existing.center_id,
            }));
        }

        let center = match self.centers.get(&row.center_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = txn.get_center(row.center_id)?;
                self.centers.insert(row.center_id, fetched.clone());
                fetched
            }
        };
        let Some(center) = center else {
            return Ok(Err(Conflict::CenterMissing));
        };
        if !center.is_active {
            return Ok(Err(Conflict::CenterInactive));
        }

        let used = self.used.get(&center.id).copied().unwrap_or(0);
        let remaining = center.capacity.saturating_sub(used);
        if remaining < row.demand {
            return Ok(Err(Conflict::Insufficient { remaining }));
        }
        Ok(Ok(()))
    }

    fn take(&mut self, center_id: CenterId, seats: u32) {
        let entry = self.used.entry(center_id).or_default();
        *entry = entry.saturating_add(seats);
    }
}

/// Commit `plan` in a single write transaction.
///
/// On `Err` nothing has been written, including when `cancel` fires
/// mid-commit.
pub fn commit(
    store: &StateStore,
    plan: &AssignmentPlan,
    cancel: &CancelToken,
) -> EngineResult<CommitOutcome> {
    let year = plan.exam_year_id;

    let outcome = store.write_scope(|txn| -> EngineResult<CommitOutcome> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let now = epoch_secs();
        let mut view = TxnView::load(txn, plan)?;
        let mut outcome = CommitOutcome::default();
        let mut conflicts: Vec<PlannedSkip> = Vec::new();

        for row in &plan.assignments {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            if let Err(conflict) = view.check(txn, year, row)? {
                warn!(
                    exam_year = year,
                    school_id = row.school_id,
                    center_id = row.center_id,
                    %conflict,
                    "planned assignment failed re-validation"
                );
                conflicts.push(PlannedSkip {
                    school_id: row.school_id,
                    reason: SkipReason::ConflictDetected,
                    demand: row.demand,
                });
                continue;
            }

            let assignment = Assignment {
                exam_year_id: year,
                school_id: row.school_id,
                center_id: row.center_id,
                seats: row.demand,
                tier: Some(row.tier),
                source: AssignmentSource::Engine,
                assigned_at: now,
            };
            txn.insert_assignment(&assignment)?;
            txn.remove_skip(year, row.school_id)?;
            view.take(row.center_id, row.demand);
            debug!(
                exam_year = year,
                school_id = row.school_id,
                center_id = row.center_id,
                tier = ?row.tier,
                "assignment written"
            );
            outcome.committed.push(assignment);
        }

        for skip in plan.skips.iter().chain(conflicts.iter()) {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            // A school assigned by another run or an override is not skipped,
            // whatever a stale plan says; only a lost conflict is still reported.
            if txn.get_assignment(year, skip.school_id)?.is_some() {
                txn.remove_skip(year, skip.school_id)?;
                if skip.reason == SkipReason::ConflictDetected {
                    outcome.skips.push(CommittedSkip {
                        school_id: skip.school_id,
                        reason: skip.reason,
                        demand: skip.demand,
                        known: false,
                    });
                } else {
                    debug!(
                        exam_year = year,
                        school_id = skip.school_id,
                        reason = %skip.reason,
                        "planned skip dropped, school already assigned"
                    );
                }
                continue;
            }

            let known = txn
                .get_skip(year, skip.school_id)?
                .is_some_and(|r| r.reason == skip.reason && r.demand == skip.demand);
            if !known {
                txn.put_skip(&SkipRecord {
                    exam_year_id: year,
                    school_id: skip.school_id,
                    reason: skip.reason,
                    demand: skip.demand,
                    recorded_at: now,
                })?;
            }
            outcome.skips.push(CommittedSkip {
                school_id: skip.school_id,
                reason: skip.reason,
                demand: skip.demand,
                known,
            });
        }

        Ok(outcome)
    })?;

    info!(
        exam_year = year,
        committed = outcome.committed.len(),
        skipped = outcome.skips.len(),
        conflicts = outcome.conflict_count(),
        "assignment plan committed"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatplan_state::{Cluster, Region, School, Tier};

    fn test_state() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_region(&Region {
                id: 1,
                name: "North".to_string(),
            })
            .unwrap();
        store
            .put_cluster(&Cluster {
                id: 1,
                name: "C1".to_string(),
                region_id: 1,
            })
            .unwrap();
        for (id, capacity) in [(1, 100), (2, 50)] {
            store
                .put_center(&ExamCenter {
                    id,
                    name: format!("center-{id}"),
                    region_id: 1,
                    cluster_id: 1,
                    capacity,
                    is_active: true,
                })
                .unwrap();
        }
        for id in 1..=3 {
            store
                .put_school(&School {
                    id,
                    name: format!("school-{id}"),
                    region_id: Some(1),
                    cluster_id: Some(1),
                })
                .unwrap();
        }
        store
    }

    fn make_plan(
        assignments: Vec<(SchoolId, CenterId, u32)>,
        skips: Vec<(SchoolId, SkipReason, u32)>,
    ) -> AssignmentPlan {
        AssignmentPlan {
            exam_year_id: 2025,
            assignments: assignments
                .into_iter()
                .map(|(school_id, center_id, demand)| PlannedAssignment {
                    school_id,
                    center_id,
                    tier: Tier::Cluster,
                    demand,
                })
                .collect(),
            skips: skips
                .into_iter()
                .map(|(school_id, reason, demand)| PlannedSkip {
                    school_id,
                    reason,
                    demand,
                })
                .collect(),
        }
    }

    fn commit_plan(store: &StateStore, plan: &AssignmentPlan) -> CommitOutcome {
        commit(store, plan, &CancelToken::new()).unwrap()
    }

    fn logged_skips(store: &StateStore) -> Vec<(SchoolId, SkipReason)> {
        store
            .list_skips(2025)
            .unwrap()
            .iter()
            .map(|s| (s.school_id, s.reason))
            .collect()
    }

    #[test]
    fn writes_assignments_and_skips() {
        let store = test_state();
        let plan = make_plan(vec![(1, 1, 40)], vec![(2, SkipReason::NoCapacity, 500)]);

        let outcome = commit_plan(&store, &plan);

        assert_eq!(outcome.committed.len(), 1);
        let stored = store.get_assignment(2025, 1).unwrap().unwrap();
        assert_eq!(stored.center_id, 1);
        assert_eq!(stored.seats, 40);
        assert_eq!(stored.tier, Some(Tier::Cluster));
        assert_eq!(stored.source, AssignmentSource::Engine);

        assert_eq!(logged_skips(&store), vec![(2, SkipReason::NoCapacity)]);
        assert!(!outcome.skips[0].known);
    }

    #[test]
    fn over_capacity_row_becomes_conflict() {
        let store = test_state();
        // Stale plan: both rows assumed center 2 had 50 free.
        let plan = make_plan(vec![(1, 2, 30), (2, 2, 30)], vec![]);

        let outcome = commit_plan(&store, &plan);

        assert_eq!(outcome.committed.len(), 1);
        assert_eq!(outcome.conflict_count(), 1);
        assert_eq!(outcome.skips[0].school_id, 2);
        assert_eq!(outcome.skips[0].reason, SkipReason::ConflictDetected);
        assert!(store.get_assignment(2025, 2).unwrap().is_none());
        // School 2 is still unassigned, so the conflict is logged.
        assert_eq!(logged_skips(&store), vec![(2, SkipReason::ConflictDetected)]);
    }

    #[test]
    fn already_assigned_school_is_not_overwritten() {
        let store = test_state();
        commit_plan(&store, &make_plan(vec![(1, 1, 10)], vec![]));

        let outcome = commit_plan(&store, &make_plan(vec![(1, 2, 10)], vec![]));

        assert!(outcome.committed.is_empty());
        assert_eq!(outcome.conflict_count(), 1);
        assert_eq!(store.get_assignment(2025, 1).unwrap().unwrap().center_id, 1);
    }

    #[test]
    fn conflict_for_assigned_school_is_reported_not_logged() {
        let store = test_state();
        let plan = make_plan(vec![(1, 1, 10)], vec![]);
        commit_plan(&store, &plan);

        let outcome = commit_plan(&store, &plan);

        assert_eq!(outcome.skips.len(), 1);
        assert_eq!(outcome.skips[0].reason, SkipReason::ConflictDetected);
        assert!(!outcome.skips[0].known);
        assert_eq!(store.get_assignment(2025, 1).unwrap().unwrap().center_id, 1);
        assert!(logged_skips(&store).is_empty());
    }

    #[test]
    fn stale_skip_for_assigned_school_is_dropped() {
        let store = test_state();
        // Another run places school 3 after the stale plan was computed.
        commit_plan(&store, &make_plan(vec![(3, 1, 60)], vec![]));
        // Leftover record from a run that raced the assignment.
        store
            .write_scope(|txn| {
                txn.put_skip(&SkipRecord {
                    exam_year_id: 2025,
                    school_id: 3,
                    reason: SkipReason::NoCapacity,
                    demand: 60,
                    recorded_at: 0,
                })
            })
            .unwrap();

        let stale = make_plan(vec![], vec![(3, SkipReason::NoCapacity, 60)]);
        let outcome = commit_plan(&store, &stale);

        assert!(outcome.skips.is_empty());
        assert!(logged_skips(&store).is_empty());
        assert!(store.get_assignment(2025, 3).unwrap().is_some());
    }

    #[test]
    fn inactive_or_missing_center_is_a_conflict() {
        let store = test_state();
        let mut closed = store.get_center(2).unwrap().unwrap();
        closed.is_active = false;
        store.put_center(&closed).unwrap();

        let outcome = commit_plan(&store, &make_plan(vec![(1, 2, 1), (2, 99, 1)], vec![]));

        assert!(outcome.committed.is_empty());
        assert_eq!(outcome.conflict_count(), 2);
        assert!(store.list_assignments(2025).unwrap().is_empty());
    }

    #[test]
    fn unchanged_skip_is_known_on_second_commit() {
        let store = test_state();
        let plan = make_plan(vec![], vec![(3, SkipReason::NoCapacity, 500)]);

        let first = commit_plan(&store, &plan);
        let recorded_at = store.list_skips(2025).unwrap()[0].recorded_at;
        let second = commit_plan(&store, &plan);

        assert!(!first.skips[0].known);
        assert!(second.skips[0].known);
        assert_eq!(store.list_skips(2025).unwrap()[0].recorded_at, recorded_at);
    }

    #[test]
    fn changed_demand_is_a_new_skip() {
        let store = test_state();
        commit_plan(&store, &make_plan(vec![], vec![(3, SkipReason::NoCapacity, 500)]));

        let changed = make_plan(vec![], vec![(3, SkipReason::NoCapacity, 600)]);
        let outcome = commit_plan(&store, &changed);

        assert!(!outcome.skips[0].known);
        assert_eq!(store.list_skips(2025).unwrap()[0].demand, 600);
    }

    #[test]
    fn assignment_clears_previous_skip() {
        let store = test_state();
        commit_plan(&store, &make_plan(vec![], vec![(1, SkipReason::NoCapacity, 10)]));

        commit_plan(&store, &make_plan(vec![(1, 1, 10)], vec![]));

        assert!(logged_skips(&store).is_empty());
    }

    #[test]
    fn cancelled_commit_writes_nothing() {
        let store = test_state();
        let cancel = CancelToken::new();
        cancel.cancel();
        let plan = make_plan(vec![(1, 1, 10)], vec![(2, SkipReason::NoCapacity, 1)]);

        let err = commit(&store, &plan, &cancel).unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        assert!(store.list_assignments(2025).unwrap().is_empty());
        assert!(logged_skips(&store).is_empty());
    }
}
