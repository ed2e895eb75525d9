//! StateStore — redb-backed persistence for the assignment engine.
//!
//! Provides typed access to regions, clusters, centers, schools, roster
//! headcounts, assignments and the skip log. All values are JSON-serialized
//! into redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

/// An open write transaction.
///
/// Obtained through [`StateStore::write_scope`]; redb holds its single-writer
/// lock until the scope returns.
pub struct StoreTxn {
    txn: WriteTransaction,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [REGIONS, CLUSTERS, CENTERS, SCHOOLS, ROSTER, ASSIGNMENTS, SKIPS] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Run `f` inside one write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and is aborted otherwise,
    /// leaving the store exactly as it was.
    pub fn write_scope<T, E>(
        &self,
        f: impl FnOnce(&mut StoreTxn) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StateError>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut scope = StoreTxn { txn };
        match f(&mut scope) {
            Ok(value) => {
                scope.txn.commit().map_err(map_err!(Transaction))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = scope.txn.abort() {
                    warn!(error = %abort_err, "write transaction abort failed");
                }
                debug!("write scope rolled back");
                Err(err)
            }
        }
    }

    // ── Geography ──────────────────────────────────────────────────

    pub fn put_region(&self, region: &Region) -> StateResult<()> {
        self.put_record(REGIONS, &region.id.to_string(), region)
    }

    pub fn list_regions(&self) -> StateResult<Vec<Region>> {
        let mut regions: Vec<Region> = self.scan_records(REGIONS, "")?;
        regions.sort_by_key(|r| r.id);
        Ok(regions)
    }

    pub fn put_cluster(&self, cluster: &Cluster) -> StateResult<()> {
        self.put_record(CLUSTERS, &cluster.id.to_string(), cluster)
    }

    pub fn list_clusters(&self) -> StateResult<Vec<Cluster>> {
        let mut clusters: Vec<Cluster> = self.scan_records(CLUSTERS, "")?;
        clusters.sort_by_key(|c| c.id);
        Ok(clusters)
    }

    // ── Centers ────────────────────────────────────────────────────

    /// Insert or update an examination center.
    pub fn put_center(&self, center: &ExamCenter) -> StateResult<()> {
        self.put_record(CENTERS, &center.id.to_string(), center)?;
        debug!(center_id = center.id, capacity = center.capacity, "center stored");
        Ok(())
    }

    pub fn get_center(&self, center_id: CenterId) -> StateResult<Option<ExamCenter>> {
        self.get_record(CENTERS, &center_id.to_string())
    }

    /// List all centers, active or not, ordered by id.
    pub fn list_centers(&self) -> StateResult<Vec<ExamCenter>> {
        let mut centers: Vec<ExamCenter> = self.scan_records(CENTERS, "")?;
        centers.sort_by_key(|c| c.id);
        Ok(centers)
    }

    // ── Schools ────────────────────────────────────────────────────

    pub fn put_school(&self, school: &School) -> StateResult<()> {
        self.put_record(SCHOOLS, &school.id.to_string(), school)
    }

    pub fn get_school(&self, school_id: SchoolId) -> StateResult<Option<School>> {
        self.get_record(SCHOOLS, &school_id.to_string())
    }

    pub fn list_schools(&self) -> StateResult<Vec<School>> {
        let mut schools: Vec<School> = self.scan_records(SCHOOLS, "")?;
        schools.sort_by_key(|s| s.id);
        Ok(schools)
    }

    // ── Roster ─────────────────────────────────────────────────────

    pub fn put_headcount(&self, entry: &RosterEntry) -> StateResult<()> {
        self.put_record(ROSTER, &entry.table_key(), entry)
    }

    pub fn get_headcount(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> StateResult<Option<u32>> {
        let entry: Option<RosterEntry> =
            self.get_record(ROSTER, &year_key(exam_year_id, school_id))?;
        Ok(entry.map(|e| e.headcount))
    }

    // ── Assignments ────────────────────────────────────────────────

    pub fn get_assignment(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> StateResult<Option<Assignment>> {
        self.get_record(ASSIGNMENTS, &year_key(exam_year_id, school_id))
    }

    /// List all assignments of an exam year, ordered by school id.
    pub fn list_assignments(&self, exam_year_id: ExamYearId) -> StateResult<Vec<Assignment>> {
        let mut assignments: Vec<Assignment> =
            self.scan_records(ASSIGNMENTS, &year_prefix(exam_year_id))?;
        assignments.sort_by_key(|a| a.school_id);
        Ok(assignments)
    }

    /// Record an administrative override.
    ///
    /// Returns `false` without writing if the school already holds an
    /// assignment for the year. The target center must exist and have room.
    pub fn record_manual_assignment(&self, assignment: &Assignment) -> StateResult<bool> {
        self.write_scope(|txn| {
            if txn
                .get_assignment(assignment.exam_year_id, assignment.school_id)?
                .is_some()
            {
                return Ok(false);
            }
            let center = txn.get_center(assignment.center_id)?.ok_or_else(|| {
                StateError::NotFound(format!("center {}", assignment.center_id))
            })?;
            let used: u32 = txn
                .list_assignments(assignment.exam_year_id)?
                .iter()
                .filter(|a| a.center_id == center.id)
                .map(|a| a.seats)
                .sum();
            if used.saturating_add(assignment.seats) > center.capacity {
                return Err(StateError::Invalid(format!(
                    "center {} has {} of {} seats in use, cannot hold {} more",
                    center.id, used, center.capacity, assignment.seats
                )));
            }
            txn.insert_assignment(assignment)?;
            txn.remove_skip(assignment.exam_year_id, assignment.school_id)?;
            Ok(true)
        })
    }

    // ── Skip log ───────────────────────────────────────────────────

    /// List recorded skips of an exam year, ordered by school id.
    pub fn list_skips(&self, exam_year_id: ExamYearId) -> StateResult<Vec<SkipRecord>> {
        let mut skips: Vec<SkipRecord> = self.scan_records(SKIPS, &year_prefix(exam_year_id))?;
        skips.sort_by_key(|s| s.school_id);
        Ok(skips)
    }

    // ── Read models ────────────────────────────────────────────────

    /// Read everything an assignment run needs from a single read transaction.
    pub fn load_year_snapshot(&self, exam_year_id: ExamYearId) -> StateResult<YearSnapshot> {
        let prefix = year_prefix(exam_year_id);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;

        let mut clusters: Vec<Cluster> =
            scan_json(&txn.open_table(CLUSTERS).map_err(map_err!(Table))?, "")?;
        let mut centers: Vec<ExamCenter> =
            scan_json(&txn.open_table(CENTERS).map_err(map_err!(Table))?, "")?;
        let mut schools: Vec<School> =
            scan_json(&txn.open_table(SCHOOLS).map_err(map_err!(Table))?, "")?;
        let mut assignments: Vec<Assignment> =
            scan_json(&txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?, &prefix)?;
        let mut skips: Vec<SkipRecord> =
            scan_json(&txn.open_table(SKIPS).map_err(map_err!(Table))?, &prefix)?;

        clusters.sort_by_key(|c| c.id);
        centers.sort_by_key(|c| c.id);
        schools.sort_by_key(|s| s.id);
        assignments.sort_by_key(|a| a.school_id);
        skips.sort_by_key(|s| s.school_id);

        debug!(
            exam_year = exam_year_id,
            centers = centers.len(),
            schools = schools.len(),
            assignments = assignments.len(),
            "year snapshot loaded"
        );

        Ok(YearSnapshot {
            exam_year_id,
            clusters,
            centers,
            schools,
            assignments,
            skips,
        })
    }

    /// Seat usage per center for an exam year, ordered by center id.
    pub fn center_utilization(
        &self,
        exam_year_id: ExamYearId,
    ) -> StateResult<Vec<CenterUtilization>> {
        let centers = self.list_centers()?;
        let assignments = self.list_assignments(exam_year_id)?;

        let mut usage: HashMap<CenterId, (u32, u32)> = HashMap::new();
        for a in &assignments {
            let entry = usage.entry(a.center_id).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(a.seats);
            entry.1 += 1;
        }

        Ok(centers
            .into_iter()
            .map(|c| {
                let (used, school_count) = usage.get(&c.id).copied().unwrap_or((0, 0));
                CenterUtilization {
                    center_id: c.id,
                    name: c.name,
                    is_active: c.is_active,
                    capacity: c.capacity,
                    used,
                    remaining: c.capacity.saturating_sub(used),
                    school_count,
                }
            })
            .collect())
    }

    // ── Import ─────────────────────────────────────────────────────

    /// Write a bulk snapshot in one transaction.
    ///
    /// Rejects the whole import if a cluster references an unknown region, a
    /// center's cluster is not inside its region, a school's cluster and
    /// region disagree, or a roster entry names an unknown school.
    pub fn import_snapshot(&self, snapshot: &Snapshot) -> StateResult<ImportSummary> {
        let summary = self.write_scope(|txn| {
            {
                let mut table = txn.txn.open_table(REGIONS).map_err(map_err!(Table))?;
                for region in &snapshot.regions {
                    put_json(&mut table, &region.id.to_string(), region)?;
                }
            }

            let region_ids: HashSet<RegionId> = {
                let table = txn.txn.open_table(REGIONS).map_err(map_err!(Table))?;
                scan_json::<Region, _>(&table, "")?
                    .into_iter()
                    .map(|r| r.id)
                    .collect()
            };

            {
                let mut table = txn.txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
                for cluster in &snapshot.clusters {
                    if !region_ids.contains(&cluster.region_id) {
                        return Err(StateError::Invalid(format!(
                            "cluster {} references unknown region {}",
                            cluster.id, cluster.region_id
                        )));
                    }
                    put_json(&mut table, &cluster.id.to_string(), cluster)?;
                }
            }

            let cluster_regions: HashMap<ClusterId, RegionId> = {
                let table = txn.txn.open_table(CLUSTERS).map_err(map_err!(Table))?;
                scan_json::<Cluster, _>(&table, "")?
                    .into_iter()
                    .map(|c| (c.id, c.region_id))
                    .collect()
            };

            {
                let mut table = txn.txn.open_table(CENTERS).map_err(map_err!(Table))?;
                for center in &snapshot.centers {
                    match cluster_regions.get(&center.cluster_id) {
                        Some(&region_id) if region_id == center.region_id => {}
                        Some(&region_id) => {
                            return Err(StateError::Invalid(format!(
                                "center {} is in region {} but its cluster {} belongs to region {}",
                                center.id, center.region_id, center.cluster_id, region_id
                            )));
                        }
                        None => {
                            return Err(StateError::Invalid(format!(
                                "center {} references unknown cluster {}",
                                center.id, center.cluster_id
                            )));
                        }
                    }
                    put_json(&mut table, &center.id.to_string(), center)?;
                }
            }

            {
                let mut table = txn.txn.open_table(SCHOOLS).map_err(map_err!(Table))?;
                for school in &snapshot.schools {
                    validate_school(school, &region_ids, &cluster_regions)?;
                    put_json(&mut table, &school.id.to_string(), school)?;
                }
            }

            let school_ids: HashSet<SchoolId> = {
                let table = txn.txn.open_table(SCHOOLS).map_err(map_err!(Table))?;
                scan_json::<School, _>(&table, "")?
                    .into_iter()
                    .map(|s| s.id)
                    .collect()
            };

            {
                let mut table = txn.txn.open_table(ROSTER).map_err(map_err!(Table))?;
                for entry in &snapshot.roster {
                    if !school_ids.contains(&entry.school_id) {
                        return Err(StateError::Invalid(format!(
                            "roster entry references unknown school {}",
                            entry.school_id
                        )));
                    }
                    put_json(&mut table, &entry.table_key(), entry)?;
                }
            }

            Ok(ImportSummary {
                regions: snapshot.regions.len(),
                clusters: snapshot.clusters.len(),
                centers: snapshot.centers.len(),
                schools: snapshot.schools.len(),
                roster: snapshot.roster.len(),
            })
        })?;
        debug!(?summary, "snapshot imported");
        Ok(summary)
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn put_record<T: Serialize>(
        &self,
        def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        value: &T,
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            put_json(&mut table, key, value)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(
        &self,
        def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        get_json(&table, key)
    }

    fn scan_records<T: DeserializeOwned>(
        &self,
        def: TableDefinition<'static, &'static str, &'static [u8]>,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        scan_json(&table, prefix)
    }
}

impl StoreTxn {
    pub fn get_center(&self, center_id: CenterId) -> StateResult<Option<ExamCenter>> {
        let table = self.txn.open_table(CENTERS).map_err(map_err!(Table))?;
        get_json(&table, &center_id.to_string())
    }

    pub fn get_assignment(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> StateResult<Option<Assignment>> {
        let table = self.txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        get_json(&table, &year_key(exam_year_id, school_id))
    }

    /// Assignments of the year as this transaction sees them, including rows
    /// it has written itself.
    pub fn list_assignments(&self, exam_year_id: ExamYearId) -> StateResult<Vec<Assignment>> {
        let table = self.txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        scan_json(&table, &year_prefix(exam_year_id))
    }

    pub fn insert_assignment(&mut self, assignment: &Assignment) -> StateResult<()> {
        let mut table = self.txn.open_table(ASSIGNMENTS).map_err(map_err!(Table))?;
        put_json(&mut table, &assignment.table_key(), assignment)
    }

    pub fn get_skip(
        &self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> StateResult<Option<SkipRecord>> {
        let table = self.txn.open_table(SKIPS).map_err(map_err!(Table))?;
        get_json(&table, &year_key(exam_year_id, school_id))
    }

    pub fn put_skip(&mut self, record: &SkipRecord) -> StateResult<()> {
        let mut table = self.txn.open_table(SKIPS).map_err(map_err!(Table))?;
        put_json(&mut table, &record.table_key(), record)
    }

    /// Returns true if a skip record existed.
    pub fn remove_skip(
        &mut self,
        exam_year_id: ExamYearId,
        school_id: SchoolId,
    ) -> StateResult<bool> {
        let mut table = self.txn.open_table(SKIPS).map_err(map_err!(Table))?;
        let existed = table
            .remove(year_key(exam_year_id, school_id).as_str())
            .map_err(map_err!(Write))?
            .is_some();
        Ok(existed)
    }
}

fn validate_school(
    school: &School,
    region_ids: &HashSet<RegionId>,
    cluster_regions: &HashMap<ClusterId, RegionId>,
) -> StateResult<()> {
    if let Some(region_id) = school.region_id {
        if !region_ids.contains(&region_id) {
            return Err(StateError::Invalid(format!(
                "school {} references unknown region {region_id}",
                school.id
            )));
        }
    }
    if let Some(cluster_id) = school.cluster_id {
        let Some(&parent) = cluster_regions.get(&cluster_id) else {
            return Err(StateError::Invalid(format!(
                "school {} references unknown cluster {cluster_id}",
                school.id
            )));
        };
        if school.region_id.is_some_and(|r| r != parent) {
            return Err(StateError::Invalid(format!(
                "school {} cluster {cluster_id} belongs to region {parent}, not {:?}",
                school.id, school.region_id
            )));
        }
    }
    Ok(())
}

fn get_json<T, Tbl>(table: &Tbl, key: &str) -> StateResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value: T = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Deserialize every row whose key starts with `prefix` (`""` for all rows).
fn scan_json<T, Tbl>(table: &Tbl, prefix: &str) -> StateResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(prefix) {
            let record: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
    }
    Ok(results)
}

fn put_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
