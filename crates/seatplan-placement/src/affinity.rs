//! Geographic affinity — which centers could take a school, in tier order.
//!
//! - **Tier 1 (cluster)**: active centers in the school's cluster
//! - **Tier 2 (region)**: remaining active centers in the school's region
//! - **Tier 3 (none)**: nothing left, the school is skipped
//!
//! The resolver is pure. It answers "which centers could work", never
//! "which one wins"; capacity is the planner's concern.

use std::collections::HashMap;

use seatplan_state::{CenterId, Cluster, ClusterId, ExamCenter, RegionId, School, Tier};

#[derive(Debug, Clone, Copy)]
struct Site {
    center_id: CenterId,
    region_id: RegionId,
    cluster_id: ClusterId,
}

/// Candidate centers for one school.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateTiers {
    /// Same-cluster centers, ascending id.
    pub cluster: Vec<CenterId>,
    /// Same-region centers not already in `cluster`, ascending id.
    pub region: Vec<CenterId>,
    /// False when the school carries neither a region nor a cluster.
    pub located: bool,
}

impl CandidateTiers {
    /// Tiers in fallback order.
    pub fn tiers(&self) -> [(Tier, &[CenterId]); 2] {
        [
            (Tier::Cluster, self.cluster.as_slice()),
            (Tier::Region, self.region.as_slice()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.cluster.is_empty() && self.region.is_empty()
    }
}

/// Resolves candidate tiers against the active centers of a run.
#[derive(Debug, Clone, Default)]
pub struct AffinityResolver {
    sites: Vec<Site>,
    cluster_regions: HashMap<ClusterId, RegionId>,
}

impl AffinityResolver {
    /// Only active centers are kept.
    pub fn new(centers: &[ExamCenter], clusters: &[Cluster]) -> Self {
        let mut sites: Vec<Site> = centers
            .iter()
            .filter(|c| c.is_active)
            .map(|c| Site {
                center_id: c.id,
                region_id: c.region_id,
                cluster_id: c.cluster_id,
            })
            .collect();
        sites.sort_by_key(|s| s.center_id);

        let cluster_regions = clusters.iter().map(|c| (c.id, c.region_id)).collect();

        Self {
            sites,
            cluster_regions,
        }
    }

    /// The school's own region, or its cluster's parent region.
    pub fn effective_region(&self, school: &School) -> Option<RegionId> {
        school.region_id.or_else(|| {
            school
                .cluster_id
                .and_then(|c| self.cluster_regions.get(&c).copied())
        })
    }

    pub fn resolve(&self, school: &School) -> CandidateTiers {
        let located = school.region_id.is_some() || school.cluster_id.is_some();

        let cluster: Vec<CenterId> = match school.cluster_id {
            Some(cluster_id) => self
                .sites
                .iter()
                .filter(|s| s.cluster_id == cluster_id)
                .map(|s| s.center_id)
                .collect(),
            None => Vec::new(),
        };

        let region: Vec<CenterId> = match self.effective_region(school) {
            Some(region_id) => self
                .sites
                .iter()
                .filter(|s| s.region_id == region_id && !cluster.contains(&s.center_id))
                .map(|s| s.center_id)
                .collect(),
            None => Vec::new(),
        };

        CandidateTiers {
            cluster,
            region,
            located,
        }
    }
}
