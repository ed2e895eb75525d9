//! AssignmentEngine — load, plan, commit, report.
//!
//! ```text
//! run_assignment(year)
//!   ├── StateStore::load_year_snapshot   (one read transaction)
//!   ├── Roster::headcount per pending school
//!   ├── plan_assignments                 (pure, seatplan-placement)
//!   ├── writer::commit                   (one write transaction)
//!   └── AssignmentReport
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use seatplan_placement::{
    AssignmentPlan, CapacityLedger, SchoolDemand, ledger_from_snapshot, pending_schools,
    plan_assignments, resolver_from_snapshot,
};
use seatplan_state::{Assignment, CenterUtilization, ExamYearId, SkipRecord, StateStore};

use crate::cancel::CancelToken;
use crate::error::{EngineError, EngineResult};
use crate::report::AssignmentReport;
use crate::roster::{Roster, StoredRoster};
use crate::writer;

/// Per-run options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Re-report skips the skip log already holds unchanged.
    pub include_known_skips: bool,
}

/// Drives assignment runs against one store and roster.
#[derive(Clone)]
pub struct AssignmentEngine {
    store: StateStore,
    roster: Arc<dyn Roster>,
}

impl AssignmentEngine {
    pub fn new(store: StateStore, roster: Arc<dyn Roster>) -> Self {
        Self { store, roster }
    }

    /// Engine whose roster is the store's own roster table.
    pub fn with_stored_roster(store: StateStore) -> Self {
        let roster = Arc::new(StoredRoster::new(store.clone()));
        Self::new(store, roster)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Remaining seats per active center, from the stored assignments.
    pub fn load_ledger(&self, exam_year_id: ExamYearId) -> EngineResult<CapacityLedger> {
        let snapshot = self.store.load_year_snapshot(exam_year_id)?;
        Ok(ledger_from_snapshot(&snapshot))
    }

    /// Plan the year against the current store state without writing.
    pub fn plan(&self, exam_year_id: ExamYearId) -> EngineResult<AssignmentPlan> {
        let snapshot = self.store.load_year_snapshot(exam_year_id)?;

        let pending = pending_schools(&snapshot);
        let mut demands = Vec::with_capacity(pending.len());
        for school in pending {
            let demand = match self.roster.headcount(exam_year_id, school.id)? {
                Some(headcount) => headcount,
                None => {
                    debug!(
                        exam_year = exam_year_id,
                        school_id = school.id,
                        "no roster entry, demand 0"
                    );
                    0
                }
            };
            demands.push(SchoolDemand { school, demand });
        }

        let resolver = resolver_from_snapshot(&snapshot);
        let mut ledger = ledger_from_snapshot(&snapshot);
        Ok(plan_assignments(exam_year_id, demands, &resolver, &mut ledger))
    }

    /// Dry run: the report a run would produce now, with nothing written.
    pub fn preview(&self, exam_year_id: ExamYearId) -> EngineResult<AssignmentReport> {
        let plan = self.plan(exam_year_id)?;
        Ok(AssignmentReport::from_plan(&plan))
    }

    pub fn run_assignment(
        &self,
        exam_year_id: ExamYearId,
        options: RunOptions,
    ) -> EngineResult<AssignmentReport> {
        self.run_assignment_with_cancel(exam_year_id, options, &CancelToken::new())
    }

    /// Assign every pending school of the year and commit the result.
    ///
    /// Any error leaves the store untouched.
    pub fn run_assignment_with_cancel(
        &self,
        exam_year_id: ExamYearId,
        options: RunOptions,
        cancel: &CancelToken,
    ) -> EngineResult<AssignmentReport> {
        info!(exam_year = exam_year_id, "assignment run started");

        let plan = self.plan(exam_year_id)?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let outcome = writer::commit(&self.store, &plan, cancel)?;
        let report =
            AssignmentReport::from_commit(exam_year_id, &outcome, options.include_known_skips);

        info!(
            exam_year = exam_year_id,
            assigned = report.assigned_count,
            skipped = report.skipped_count,
            known_skips = report.known_skip_count,
            conflicts = report.conflict_count,
            "assignment run finished"
        );
        Ok(report)
    }

    /// Run on the blocking pool, cancelling the run if it outlives `timeout`.
    pub async fn run_with_timeout(
        &self,
        exam_year_id: ExamYearId,
        options: RunOptions,
        timeout: Duration,
    ) -> EngineResult<AssignmentReport> {
        let engine = self.clone();
        let cancel = CancelToken::new();
        let task_cancel = cancel.clone();
        let mut handle = tokio::task::spawn_blocking(move || {
            engine.run_assignment_with_cancel(exam_year_id, options, &task_cancel)
        });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined.map_err(|e| EngineError::Join(e.to_string()))?,
            Err(_) => {
                warn!(exam_year = exam_year_id, ?timeout, "assignment run timed out, cancelling");
                cancel.cancel();
                // The task may have finished between the timeout and the cancel.
                match handle.await {
                    Ok(Err(EngineError::Cancelled)) => Err(EngineError::TimedOut(timeout)),
                    Ok(result) => result,
                    Err(e) => Err(EngineError::Join(e.to_string())),
                }
            }
        }
    }

    /// Preview on the blocking pool.
    pub async fn preview_blocking(
        &self,
        exam_year_id: ExamYearId,
    ) -> EngineResult<AssignmentReport> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.preview(exam_year_id))
            .await
            .map_err(|e| EngineError::Join(e.to_string()))?
    }

    // ── Read side ──────────────────────────────────────────────────

    pub fn list_assignments(&self, exam_year_id: ExamYearId) -> EngineResult<Vec<Assignment>> {
        Ok(self.store.list_assignments(exam_year_id)?)
    }

    /// Skips recorded by earlier runs, including ones a run left unreported.
    pub fn list_skips(&self, exam_year_id: ExamYearId) -> EngineResult<Vec<SkipRecord>> {
        Ok(self.store.list_skips(exam_year_id)?)
    }

    pub fn utilization(&self, exam_year_id: ExamYearId) -> EngineResult<Vec<CenterUtilization>> {
        Ok(self.store.center_utilization(exam_year_id)?)
    }
}
