//! Domain types for the seatplan state store.
//!
//! These types represent the persisted regions, clusters, examination
//! centers, schools, roster headcounts, assignments and the skip log.
//! All types are serializable to/from JSON for storage in redb tables.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type RegionId = u64;
pub type ClusterId = u64;
pub type CenterId = u64;
pub type SchoolId = u64;
pub type ExamYearId = u64;

// ── Geography ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
}

/// A cluster always belongs to exactly one region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub region_id: RegionId,
}

// ── Centers and schools ───────────────────────────────────────────

/// A physical examination center with a fixed seat count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExamCenter {
    pub id: CenterId,
    pub name: String,
    pub region_id: RegionId,
    pub cluster_id: ClusterId,
    /// Total examination seats.
    pub capacity: u32,
    /// Inactive centers are never assignment targets.
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub region_id: Option<RegionId>,
    pub cluster_id: Option<ClusterId>,
}

/// Eligible-candidate headcount for one school in one exam year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub exam_year_id: ExamYearId,
    pub school_id: SchoolId,
    pub headcount: u32,
}

// ── Assignment ────────────────────────────────────────────────────

/// Which candidate tier produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Cluster,
    Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    Engine,
    Manual,
}

/// School → center for one exam year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub exam_year_id: ExamYearId,
    pub school_id: SchoolId,
    pub center_id: CenterId,
    /// Seats held at the center (the school's demand when assigned).
    pub seats: u32,
    /// `None` for manual overrides.
    pub tier: Option<Tier>,
    pub source: AssignmentSource,
    /// Unix timestamp (seconds).
    pub assigned_at: u64,
}

// ── Skips ─────────────────────────────────────────────────────────

/// Why a school was left unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The school has neither a region nor a cluster.
    NoRegionAssigned,
    /// No active center exists in the school's cluster or region.
    NoActiveCenter,
    /// Candidates existed but none had enough remaining seats.
    NoCapacity,
    /// Commit-time re-validation rejected the planned assignment.
    ConflictDetected,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoRegionAssigned => "no_region_assigned",
            SkipReason::NoActiveCenter => "no_active_center",
            SkipReason::NoCapacity => "no_capacity",
            SkipReason::ConflictDetected => "conflict_detected",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last skip classification recorded for a school in an exam year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkipRecord {
    pub exam_year_id: ExamYearId,
    pub school_id: SchoolId,
    pub reason: SkipReason,
    pub demand: u32,
    pub recorded_at: u64,
}

// ── Read models ───────────────────────────────────────────────────

/// Everything an assignment run reads, taken from one read transaction.
#[derive(Debug, Clone, Default)]
pub struct YearSnapshot {
    pub exam_year_id: ExamYearId,
    pub clusters: Vec<Cluster>,
    pub centers: Vec<ExamCenter>,
    pub schools: Vec<School>,
    pub assignments: Vec<Assignment>,
    pub skips: Vec<SkipRecord>,
}

/// Seat usage of one center for an exam year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CenterUtilization {
    pub center_id: CenterId,
    pub name: String,
    pub is_active: bool,
    pub capacity: u32,
    pub used: u32,
    pub remaining: u32,
    pub school_count: u32,
}

/// Bulk import document (`seatpland import`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Snapshot {
    pub regions: Vec<Region>,
    pub clusters: Vec<Cluster>,
    pub centers: Vec<ExamCenter>,
    pub schools: Vec<School>,
    pub roster: Vec<RosterEntry>,
}

/// Row counts written by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub regions: usize,
    pub clusters: usize,
    pub centers: usize,
    pub schools: usize,
    pub roster: usize,
}

/// Composite key `{exam_year_id}:{id}` for year-scoped tables.
pub fn year_key(exam_year_id: ExamYearId, id: u64) -> String {
    format!("{exam_year_id}:{id}")
}

/// Prefix matching every key of one exam year.
pub fn year_prefix(exam_year_id: ExamYearId) -> String {
    format!("{exam_year_id}:")
}

impl Assignment {
    pub fn table_key(&self) -> String {
        year_key(self.exam_year_id, self.school_id)
    }
}

impl SkipRecord {
    pub fn table_key(&self) -> String {
        year_key(self.exam_year_id, self.school_id)
    }
}

impl RosterEntry {
    pub fn table_key(&self) -> String {
        year_key(self.exam_year_id, self.school_id)
    }
}
