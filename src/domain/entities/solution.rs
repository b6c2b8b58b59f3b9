//! Solution entity module
//!
//! A Solution is a cohesive set of assignments produced by one solver
//! invocation. It is immutable after publish; at most one solution is
//! "active" per org at a time (when the org opts into that policy).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, OrgId, SolutionId};
use crate::domain::value_objects::HealthScore;

/// Per-(event, role) unfilled counts, keyed by event for deterministic
/// iteration/serialization order.
pub type ShortageByEvent = BTreeMap<EventId, BTreeMap<String, u32>>;

/// Diagnostic counters attached to a Solution as its `metrics` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolutionMetrics {
    pub total_demand: u32,
    pub filled: u32,
    pub unfilled_by_event: ShortageByEvent,
    pub per_person_count: BTreeMap<String, u32>,
    pub backtracks: u64,
    pub was_cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: SolutionId,
    pub org_id: OrgId,
    pub created_at: DateTime<Utc>,
    pub health_score: HealthScore,
    pub metrics: SolutionMetrics,
    /// The solution this run superseded, when the per-org publish lock
    /// found a newer solution already live (last-writer-wins).
    pub supersedes: Option<SolutionId>,
}

impl Solution {
    pub fn new(org_id: OrgId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: SolutionId::new(),
            org_id,
            created_at,
            health_score: HealthScore::new(0.0),
            metrics: SolutionMetrics::default(),
            supersedes: None,
        }
    }

    pub fn coverage(&self) -> f64 {
        if self.metrics.total_demand == 0 {
            1.0
        } else {
            self.metrics.filled as f64 / self.metrics.total_demand as f64
        }
    }

    pub fn has_shortage(&self) -> bool {
        self.metrics
            .unfilled_by_event
            .values()
            .any(|roles| roles.values().any(|&count| count > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn coverage_is_perfect_with_no_demand() {
        let solution = Solution::new(OrgId::new(), Utc::now());
        assert_eq!(solution.coverage(), 1.0);
        assert!(!solution.has_shortage());
    }

    #[test]
    fn coverage_reflects_filled_over_total() {
        let mut solution = Solution::new(OrgId::new(), Utc::now());
        solution.metrics.total_demand = 4;
        solution.metrics.filled = 3;
        assert_eq!(solution.coverage(), 0.75);
    }
}
