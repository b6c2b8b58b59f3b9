pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::use_cases;
pub use domain::entities;
pub use domain::value_objects;
pub use infrastructure::output;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use application::services::org_policy::OrgPolicy;
use application::services::scheduler_engine::SolverConfig;
use application::services::validation_engine::ValidationReport;
use application::services::{AvailabilityIndex, CalendarFeed};
use application::use_cases::{
    AssignmentResult, BuildIndex, CalendarOps, ListAssignments, ManualAssignmentService, Solve,
    ValidateEvent,
};
use domain::entities::{Assignment, AssignmentId, EventId, OrgId, PersonId, SolutionId};
use domain::repositories::{
    AssignmentStore, BlackoutRepository, CalendarTokenStore, EventRepository, OrganizationRepository,
    PersonRepository,
};
use domain::RosterResult;
use infrastructure::RosterConfig;

pub use domain::RosterError;

/// Top-level facade over the scheduling core. One method per operation in
/// the external interface: construct it once from a store/repository set
/// and drive the system through it rather than through the use cases
/// directly — the shape a future HTTP surface or the CLI both want.
pub struct RosterCore {
    build_index: Arc<BuildIndex>,
    solve: Solve,
    validate_event: ValidateEvent,
    manual_assignment: ManualAssignmentService,
    list_assignments: ListAssignments,
    calendar_ops: CalendarOps,
    orgs: Arc<dyn OrganizationRepository>,
    default_seed: Option<u64>,
}

impl RosterCore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orgs: Arc<dyn OrganizationRepository>,
        people: Arc<dyn PersonRepository>,
        blackouts: Arc<dyn BlackoutRepository>,
        events: Arc<dyn EventRepository>,
        store: Arc<dyn AssignmentStore>,
        tokens: Arc<dyn CalendarTokenStore>,
        config: RosterConfig,
    ) -> Self {
        let build_index = Arc::new(BuildIndex::new(people.clone(), blackouts, events.clone(), store.clone()));
        let feed = Arc::new(CalendarFeed::new(
            store.clone(),
            tokens.clone(),
            people,
            events.clone(),
            config.calendar_cache_ttl_ms,
        ));
        let solver_defaults = SolverConfig::default()
            .with_time_budget_ms(config.solver_time_budget_ms)
            .with_backtrack_budget(config.solver_backtrack_budget);
        let default_seed = config.solver_seed;

        Self {
            solve: Solve::new(build_index.clone(), events.clone(), store.clone(), solver_defaults),
            validate_event: ValidateEvent::new(build_index.clone(), events.clone(), store.clone(), orgs.clone()),
            manual_assignment: ManualAssignmentService::new(build_index.clone(), events, store.clone(), orgs.clone()),
            list_assignments: ListAssignments::new(store),
            calendar_ops: CalendarOps::new(feed, tokens),
            build_index,
            orgs,
            default_seed,
        }
    }

    pub fn build_index(&self, org_id: OrgId, as_of: DateTime<Utc>) -> RosterResult<AvailabilityIndex> {
        let org = self.orgs.get(org_id)?;
        self.build_index.execute(org_id, as_of, &org.timezone)
    }

    pub fn solve(&self, org_id: OrgId, event_ids: &[EventId], seed: Option<u64>) -> RosterResult<SolutionId> {
        let org = self.orgs.get(org_id)?;
        let policy = OrgPolicy::from_config(&org.config);
        self.solve.execute(org_id, event_ids, policy, seed.or(self.default_seed), &org.timezone)
    }

    pub fn validate_event(&self, event_id: EventId) -> RosterResult<ValidationReport> {
        self.validate_event.execute(event_id)
    }

    pub fn assign(&self, event_id: EventId, person_id: PersonId, role: String) -> RosterResult<AssignmentResult> {
        self.manual_assignment.assign(event_id, person_id, role)
    }

    pub fn unassign(&self, assignment_id: AssignmentId) -> RosterResult<()> {
        self.manual_assignment.unassign(assignment_id)
    }

    pub fn swap(&self, assignment_id_a: AssignmentId, assignment_id_b: AssignmentId) -> RosterResult<(Assignment, Assignment)> {
        self.manual_assignment.swap(assignment_id_a, assignment_id_b)
    }

    pub fn list_assignments(&self, org_id: OrgId, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> RosterResult<Vec<Assignment>> {
        self.list_assignments.execute(org_id, window_start, window_end)
    }

    pub fn get_person_calendar(&self, token: &str) -> RosterResult<String> {
        self.calendar_ops.get_person_calendar(token)
    }

    pub fn get_org_calendar(&self, org_id: OrgId) -> RosterResult<String> {
        self.calendar_ops.get_org_calendar(org_id)
    }

    pub fn rotate_calendar_token(&self, person_id: PersonId) -> RosterResult<String> {
        self.calendar_ops.rotate_calendar_token(person_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Blackout, Organization, Person};
    use crate::infrastructure::repositories::{
        InMemoryAssignmentStore, InMemoryBlackoutRepository, InMemoryCalendarTokenStore,
        InMemoryEventRepository, InMemoryOrganizationRepository, InMemoryPersonRepository,
    };
    use chrono::{Duration, NaiveDate, TimeZone};

    #[allow(clippy::type_complexity)]
    fn core() -> (
        RosterCore,
        Arc<InMemoryOrganizationRepository>,
        Arc<InMemoryPersonRepository>,
        Arc<InMemoryBlackoutRepository>,
        Arc<InMemoryEventRepository>,
    ) {
        let orgs = Arc::new(InMemoryOrganizationRepository::new());
        let people = Arc::new(InMemoryPersonRepository::new());
        let blackouts = Arc::new(InMemoryBlackoutRepository::new());
        let events = Arc::new(InMemoryEventRepository::new());
        let store = Arc::new(InMemoryAssignmentStore::new(events.clone()));
        let tokens = Arc::new(InMemoryCalendarTokenStore::new());
        let roster = RosterCore::new(
            orgs.clone(),
            people.clone(),
            blackouts.clone(),
            events.clone(),
            store,
            tokens,
            RosterConfig::default(),
        );
        (roster, orgs, people, blackouts, events)
    }

    /// A manual override of a blocked person succeeds and is flagged as
    /// manual, surfacing the conflict as a warning rather than rejecting it.
    #[test]
    fn manual_assign_overrides_a_blackout_with_a_warning_not_a_rejection() {
        use crate::domain::repositories::{BlackoutRepository, EventRepository, OrganizationRepository, PersonRepository};
        use crate::domain::entities::Event;

        let (roster, orgs, people, blackouts, events) = core();
        let org = orgs.create(Organization::new("Chapel", "UTC")).unwrap();
        let person = people.create(Person::new(org.id, "p1@example.org", "P1").with_role("usher")).unwrap();
        blackouts
            .create(Blackout::new(
                person.id,
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            ))
            .unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let event = events.create(Event::new(org.id, "service", start, start + Duration::hours(1)).with_demand("usher", 1)).unwrap();

        let result = roster.assign(event.id, person.id, "usher".to_string()).unwrap();
        assert!(result.assignment.is_manual);
        assert!(!result.report.blocked_assignments.is_empty());
    }

    /// A reassignment (unassign then assign a different role) preserves the
    /// calendar UID for the same `(event, scope)` pair, so a client refetch
    /// is seen as an update to the same VEVENT rather than a duplicate.
    #[test]
    fn calendar_uid_survives_reassignment() {
        use crate::domain::repositories::{EventRepository, OrganizationRepository, PersonRepository};
        use crate::domain::entities::Event;

        let (roster, orgs, people, _blackouts, events) = core();
        let org = orgs.create(Organization::new("Chapel", "UTC")).unwrap();
        let person = people.create(Person::new(org.id, "p1@example.org", "P1").with_role("usher")).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let event = events
            .create(Event::new(org.id, "service", start, start + Duration::hours(1)).with_demand("usher", 1))
            .unwrap();

        let first = roster.assign(event.id, person.id, "usher".to_string()).unwrap();
        let token = roster.rotate_calendar_token(person.id).unwrap();
        let ics_before = roster.get_person_calendar(&token).unwrap();

        roster.unassign(first.assignment.id).unwrap();
        roster.assign(event.id, person.id, "greeter".to_string()).unwrap();
        let ics_after = roster.get_person_calendar(&token).unwrap();

        let uid_line = |ics: &str| ics.lines().find(|l| l.starts_with("UID:")).map(str::to_string);
        assert_eq!(uid_line(&ics_before), uid_line(&ics_after));
    }
}
