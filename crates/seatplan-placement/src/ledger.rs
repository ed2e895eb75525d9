//! Capacity ledger — remaining seats per active center for one run.
//!
//! Seeded once from the centers and the assignments already stored for the
//! exam year, then mutated only through [`CapacityLedger::reserve`]. The
//! ledger never touches storage after seeding.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use seatplan_state::{Assignment, CenterId, ExamCenter};

/// A reservation that did not fit. The ledger is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("center {center_id}: {requested} seats requested, {remaining} remaining")]
pub struct InsufficientCapacity {
    pub center_id: CenterId,
    pub requested: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seats {
    capacity: u32,
    remaining: u32,
}

/// Run-scoped view of each active center's remaining seats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacityLedger {
    seats: BTreeMap<CenterId, Seats>,
}

impl CapacityLedger {
    /// Build the ledger: remaining = capacity − Σ(seats already assigned).
    ///
    /// Inactive centers are left out entirely. Assignments pointing at an
    /// inactive or unknown center are ignored. A center already holding more
    /// than its capacity clamps to zero remaining.
    pub fn seed(centers: &[ExamCenter], assignments: &[Assignment]) -> Self {
        let mut seats: BTreeMap<CenterId, Seats> = centers
            .iter()
            .filter(|c| c.is_active)
            .map(|c| {
                (
                    c.id,
                    Seats {
                        capacity: c.capacity,
                        remaining: c.capacity,
                    },
                )
            })
            .collect();

        for a in assignments {
            if let Some(entry) = seats.get_mut(&a.center_id) {
                if a.seats > entry.remaining {
                    warn!(
                        center_id = a.center_id,
                        school_id = a.school_id,
                        seats = a.seats,
                        remaining = entry.remaining,
                        "center already over capacity"
                    );
                }
                entry.remaining = entry.remaining.saturating_sub(a.seats);
            }
        }

        debug!(centers = seats.len(), "capacity ledger seeded");
        Self { seats }
    }

    /// Remaining seats, or `None` if the center is not an active center.
    pub fn remaining(&self, center_id: CenterId) -> Option<u32> {
        self.seats.get(&center_id).map(|s| s.remaining)
    }

    pub fn capacity(&self, center_id: CenterId) -> Option<u32> {
        self.seats.get(&center_id).map(|s| s.capacity)
    }

    /// True if the center is active and can take `demand` more seats.
    pub fn fits(&self, center_id: CenterId, demand: u32) -> bool {
        self.remaining(center_id).is_some_and(|r| r >= demand)
    }

    /// Take `amount` seats from a center, all or nothing.
    pub fn reserve(
        &mut self,
        center_id: CenterId,
        amount: u32,
    ) -> Result<(), InsufficientCapacity> {
        let Some(entry) = self.seats.get_mut(&center_id) else {
            return Err(InsufficientCapacity {
                center_id,
                requested: amount,
                remaining: 0,
            });
        };
        if entry.remaining < amount {
            return Err(InsufficientCapacity {
                center_id,
                requested: amount,
                remaining: entry.remaining,
            });
        }
        entry.remaining -= amount;
        Ok(())
    }

    /// Number of active centers tracked.
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// `(center_id, remaining)` in ascending center id.
    pub fn iter(&self) -> impl Iterator<Item = (CenterId, u32)> + '_ {
        self.seats.iter().map(|(id, s)| (*id, s.remaining))
    }
}
