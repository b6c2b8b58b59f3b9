//! Build Index use case
//!
//! `build_index(org_id, as_of)` from §6: constructs an `AvailabilityIndex`
//! snapshot for one org from its current people, blackouts, and committed
//! assignments.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::application::services::AvailabilityIndex;
use crate::domain::entities::OrgId;
use crate::domain::repositories::{AssignmentStore, BlackoutRepository, EventRepository, PersonRepository};
use crate::domain::RosterResult;

pub struct BuildIndex {
    people: Arc<dyn PersonRepository>,
    blackouts: Arc<dyn BlackoutRepository>,
    events: Arc<dyn EventRepository>,
    store: Arc<dyn AssignmentStore>,
}

impl BuildIndex {
    pub fn new(
        people: Arc<dyn PersonRepository>,
        blackouts: Arc<dyn BlackoutRepository>,
        events: Arc<dyn EventRepository>,
        store: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            people,
            blackouts,
            events,
            store,
        }
    }

    /// Builds a fresh snapshot as of `as_of`, default org timezone supplied
    /// separately since it lives on the Organization, not this use case.
    pub fn execute(&self, org_id: OrgId, as_of: DateTime<Utc>, org_default_timezone: &str) -> RosterResult<AvailabilityIndex> {
        let people = self.people.list_by_org(org_id)?;

        let mut all_blackouts = Vec::new();
        for person in &people {
            all_blackouts.extend(self.blackouts.list_by_person(person.id)?);
        }

        let window_start = as_of - ChronoDuration::days(365);
        let window_end = as_of + ChronoDuration::days(365);
        let committed = self.store.list_for_org(org_id, window_start, window_end)?;

        let mut existing = Vec::new();
        for assignment in committed {
            if let Ok(event) = self.events.get(assignment.event_id) {
                existing.push((assignment, event));
            }
        }

        Ok(AvailabilityIndex::build(people, all_blackouts, existing, org_default_timezone))
    }
}
