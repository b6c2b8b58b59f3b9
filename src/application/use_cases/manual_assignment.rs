//! Manual Assignment use case
//!
//! Implements `ManualAssignmentService`'s three operations: `assign`,
//! `unassign`, `swap`. Every operation records `is_manual = true` and
//! `assigned_at = now`, and re-runs `ValidationEngine` so the caller always
//! sees the post-change report.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::application::services::validation_engine::ValidationReport;
use crate::application::services::ValidationEngine;
use crate::application::use_cases::build_index::BuildIndex;
use crate::domain::entities::{Assignment, AssignmentId, EventId, PersonId};
use crate::domain::repositories::{AssignmentStore, EventRepository, OrganizationRepository};
use crate::domain::{RosterError, RosterResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub assignment: Assignment,
    pub report: ValidationReport,
}

pub struct ManualAssignmentService {
    build_index: Arc<BuildIndex>,
    events: Arc<dyn EventRepository>,
    store: Arc<dyn AssignmentStore>,
    orgs: Arc<dyn OrganizationRepository>,
}

impl ManualAssignmentService {
    pub fn new(
        build_index: Arc<BuildIndex>,
        events: Arc<dyn EventRepository>,
        store: Arc<dyn AssignmentStore>,
        orgs: Arc<dyn OrganizationRepository>,
    ) -> Self {
        Self {
            build_index,
            events,
            store,
            orgs,
        }
    }

    /// Rejects with `Conflict` if an equivalent `(event, person, role)`
    /// already exists; otherwise may succeed even while introducing a
    /// warning (e.g. a blocked person), since admins deliberately override.
    pub fn assign(&self, event_id: EventId, person_id: PersonId, role: String) -> RosterResult<AssignmentResult> {
        let existing = self.store.list_for_event(event_id)?;
        if existing.iter().any(|a| a.person_id == person_id && a.role == role) {
            return Err(RosterError::Conflict {
                event_id,
                person_id,
                role,
            });
        }

        let assignment = Assignment::new_manual(event_id, person_id, role, Utc::now());
        let committed = self.store.assign(assignment)?;
        let report = self.validation_report_for(event_id)?;

        Ok(AssignmentResult {
            assignment: committed,
            report,
        })
    }

    pub fn unassign(&self, assignment_id: AssignmentId) -> RosterResult<()> {
        self.store.unassign(assignment_id)
    }

    /// Atomic reassignment of two assignments' people, via the store's
    /// `swap`: neither intermediate state is observable to concurrent
    /// readers, since the store commits both removals and both insertions
    /// as one step.
    pub fn swap(&self, assignment_id_a: AssignmentId, assignment_id_b: AssignmentId) -> RosterResult<(Assignment, Assignment)> {
        let a = self.store.get_assignment(assignment_id_a)?;
        let b = self.store.get_assignment(assignment_id_b)?;

        let new_a = Assignment::new_manual(a.event_id, b.person_id, a.role.clone(), Utc::now());
        let new_b = Assignment::new_manual(b.event_id, a.person_id, b.role.clone(), Utc::now());

        self.store.swap(a.id, b.id, new_a, new_b)
    }

    fn validation_report_for(&self, event_id: EventId) -> RosterResult<ValidationReport> {
        let event = self.events.get(event_id)?;
        let org = self.orgs.get(event.org_id)?;
        let index = self.build_index.execute(event.org_id, Utc::now(), &org.timezone)?;
        let assignments = self.store.list_for_event(event_id)?;
        Ok(ValidationEngine::validate(&event, &assignments, &index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Event, Organization};
    use crate::domain::repositories::{MockAssignmentStore, MockBlackoutRepository, MockEventRepository, MockOrganizationRepository, MockPersonRepository};

    /// Wires mocked repositories into a real `ManualAssignmentService`,
    /// stubbing the lookups `validation_report_for` needs so each test only
    /// has to set expectations on the behavior it cares about.
    fn service_for(event: Event, org: Organization, store: MockAssignmentStore) -> ManualAssignmentService {
        let mut events = MockEventRepository::new();
        let event_for_get = event.clone();
        events.expect_get().returning(move |_| Ok(event_for_get.clone()));

        let mut index_events = MockEventRepository::new();
        let event_for_index = event.clone();
        index_events.expect_get().returning(move |_| Ok(event_for_index.clone()));

        let mut orgs = MockOrganizationRepository::new();
        let org_for_get = org.clone();
        orgs.expect_get().returning(move |_| Ok(org_for_get.clone()));

        let mut people = MockPersonRepository::new();
        people.expect_list_by_org().returning(|_| Ok(Vec::new()));

        let mut blackouts = MockBlackoutRepository::new();
        blackouts.expect_list_by_person().returning(|_| Ok(Vec::new()));

        let store = Arc::new(store);
        let build_index = Arc::new(BuildIndex::new(Arc::new(people), Arc::new(blackouts), Arc::new(index_events), store.clone()));

        ManualAssignmentService::new(build_index, Arc::new(events), store, Arc::new(orgs))
    }

    #[test]
    fn assign_rejects_duplicate_event_person_role() {
        let org = Organization::new("Chapel", "UTC");
        let event = Event::new(org.id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1));
        let person_id = PersonId::new();
        let role = "usher".to_string();

        let existing = Assignment::new_manual(event.id, person_id, role.clone(), Utc::now());
        let mut store = MockAssignmentStore::new();
        store.expect_list_for_event().returning(move |_| Ok(vec![existing.clone()]));
        store.expect_list_for_org().returning(|_, _, _| Ok(Vec::new()));

        let service = service_for(event.clone(), org, store);
        let err = service.assign(event.id, person_id, role).unwrap_err();
        assert!(matches!(err, RosterError::Conflict { .. }));
    }

    #[test]
    fn assign_commits_and_returns_validation_report() {
        let org = Organization::new("Chapel", "UTC");
        let event = Event::new(org.id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1)).with_demand("usher", 1);
        let person_id = PersonId::new();
        let role = "usher".to_string();

        let mut store = MockAssignmentStore::new();
        store.expect_list_for_event().returning(|_| Ok(Vec::new()));
        store.expect_assign().returning(|a| Ok(a));
        store.expect_list_for_org().returning(|_, _, _| Ok(Vec::new()));

        let service = service_for(event.clone(), org, store);
        let result = service.assign(event.id, person_id, role.clone()).unwrap();
        assert_eq!(result.assignment.person_id, person_id);
        assert_eq!(result.assignment.role, role);
        assert!(result.assignment.is_manual);
    }

    #[test]
    fn swap_delegates_to_a_single_store_call() {
        let org = Organization::new("Chapel", "UTC");
        let event = Event::new(org.id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1));
        let person_a = PersonId::new();
        let person_b = PersonId::new();
        let a = Assignment::new_manual(event.id, person_a, "usher".to_string(), Utc::now());
        let b = Assignment::new_manual(event.id, person_b, "greeter".to_string(), Utc::now());
        let (id_a, id_b) = (a.id, b.id);

        let mut store = MockAssignmentStore::new();
        let a_for_get = a.clone();
        store.expect_get_assignment().returning(move |id| {
            if id == id_a { Ok(a_for_get.clone()) } else { Ok(b.clone()) }
        });
        store.expect_swap().withf(move |ua, ub, _, _| *ua == id_a && *ub == id_b).returning(|_, _, new_a, new_b| Ok((new_a, new_b)));

        let service = service_for(event, org, store);
        let (committed_a, committed_b) = service.swap(id_a, id_b).unwrap();
        assert_eq!(committed_a.person_id, person_b);
        assert_eq!(committed_b.person_id, person_a);
    }

    #[test]
    fn unassign_delegates_to_store() {
        let org = Organization::new("Chapel", "UTC");
        let event = Event::new(org.id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1));
        let assignment_id = AssignmentId::new();

        let mut store = MockAssignmentStore::new();
        store.expect_unassign().withf(move |id| *id == assignment_id).returning(|_| Ok(()));

        let service = service_for(event, org, store);
        service.unassign(assignment_id).unwrap();
    }
}
