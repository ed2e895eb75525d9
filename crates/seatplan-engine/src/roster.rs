//! Roster collaborator — where school demand comes from.
//!
//! The engine never computes candidate counts. It asks a [`Roster`] for
//! each pending school's headcount and treats a missing entry as demand 0.

use std::collections::HashMap;

use seatplan_state::{ExamYearId, RosterEntry, SchoolId, StateStore};

use crate::error::RosterError;

/// Source of per-school candidate counts for an exam year.
pub trait Roster: Send + Sync {
    /// `Ok(None)` when the roster has no entry for the school.
    fn headcount(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> Result<Option<u32>, RosterError>;
}

/// Reads headcounts from the store's roster table.
#[derive(Clone)]
pub struct StoredRoster {
    store: StateStore,
}

impl StoredRoster {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl Roster for StoredRoster {
    fn headcount(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> Result<Option<u32>, RosterError> {
        self.store
            .get_headcount(exam_year_id, school_id)
            .map_err(|e| RosterError::Lookup {
                school_id,
                message: e.to_string(),
            })
    }
}

/// Fixed in-memory headcounts.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    counts: HashMap<(ExamYearId, SchoolId), u32>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, exam_year_id: ExamYearId, school_id: SchoolId, headcount: u32) -> Self {
        self.insert(exam_year_id, school_id, headcount);
        self
    }

    pub fn insert(&mut self, exam_year_id: ExamYearId, school_id: SchoolId, headcount: u32) {
        self.counts.insert((exam_year_id, school_id), headcount);
    }
}

impl FromIterator<RosterEntry> for StaticRoster {
    fn from_iter<I: IntoIterator<Item = RosterEntry>>(iter: I) -> Self {
        let counts = iter
            .into_iter()
            .map(|e| ((e.exam_year_id, e.school_id), e.headcount))
            .collect();
        Self { counts }
    }
}

impl Roster for StaticRoster {
    fn headcount(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> Result<Option<u32>, RosterError> {
        Ok(self.counts.get(&(exam_year_id, school_id)).copied())
    }
}
