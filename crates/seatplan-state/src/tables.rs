//! redb table definitions for the seatplan state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Year-scoped tables use `{exam_year_id}:{school_id}` keys.

use redb::TableDefinition;

/// Regions keyed by `{region_id}`.
pub const REGIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("regions");

/// Clusters keyed by `{cluster_id}`.
pub const CLUSTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("clusters");

/// Examination centers keyed by `{center_id}`.
pub const CENTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("centers");

/// Schools keyed by `{school_id}`.
pub const SCHOOLS: TableDefinition<&str, &[u8]> = TableDefinition::new("schools");

/// Roster headcounts keyed by `{exam_year_id}:{school_id}`.
pub const ROSTER: TableDefinition<&str, &[u8]> = TableDefinition::new("roster");

/// Assignments keyed by `{exam_year_id}:{school_id}`.
pub const ASSIGNMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("assignments");

/// Skip log keyed by `{exam_year_id}:{school_id}`.
pub const SKIPS: TableDefinition<&str, &[u8]> = TableDefinition::new("skips");
