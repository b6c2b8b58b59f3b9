//! Solve use case
//!
//! `solve(org_id, event_ids, policy, seed) -> SolutionId` from §6: runs the
//! scheduler over a chosen event set and publishes the resulting solution.

use std::sync::Arc;

use chrono::Utc;

use crate::application::services::org_policy::OrgPolicy;
use crate::application::services::{CancelToken, SchedulerEngine, SolverConfig};
use crate::application::use_cases::build_index::BuildIndex;
use crate::domain::entities::{EventId, OrgId, SolutionId};
use crate::domain::repositories::{AssignmentStore, EventRepository};
use crate::domain::RosterResult;

pub struct Solve {
    build_index: Arc<BuildIndex>,
    events: Arc<dyn EventRepository>,
    store: Arc<dyn AssignmentStore>,
    solver_defaults: SolverConfig,
}

impl Solve {
    pub fn new(
        build_index: Arc<BuildIndex>,
        events: Arc<dyn EventRepository>,
        store: Arc<dyn AssignmentStore>,
        solver_defaults: SolverConfig,
    ) -> Self {
        Self {
            build_index,
            events,
            store,
            solver_defaults,
        }
    }

    /// Runs the solver for `event_ids` and publishes the result, returning
    /// the new Solution's id. `_policy` is accepted for the §6 signature but
    /// only `OrgPolicy::manual_assignment` is currently consulted — by the
    /// caller, when deciding which existing assignments to pass in as
    /// immovable vs. rebalanceable (not yet implemented; see DESIGN.md).
    pub fn execute(
        &self,
        org_id: OrgId,
        event_ids: &[EventId],
        _policy: OrgPolicy,
        seed: Option<u64>,
        org_default_timezone: &str,
    ) -> RosterResult<SolutionId> {
        let now = Utc::now();
        let mut index = self.build_index.execute(org_id, now, org_default_timezone)?;

        let mut events = Vec::new();
        for id in event_ids {
            events.push(self.events.get(*id)?);
        }

        let mut manual = Vec::new();
        for id in event_ids {
            manual.extend(self.store.list_for_event(*id)?.into_iter().filter(|a| a.is_manual));
        }

        let seed = seed.unwrap_or_else(|| crate::application::services::scheduler_engine::derive_seed(org_id, event_ids));
        let config = self.solver_defaults.clone().with_seed(seed);
        let cancel = CancelToken::new();

        let (solution, assignments) = SchedulerEngine::solve(org_id, events, &mut index, &manual, &config, &cancel);
        let published = self.store.bulk_write(solution, assignments)?;
        Ok(published.id)
    }
}
