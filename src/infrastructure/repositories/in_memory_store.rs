//! In-memory repository implementations
//!
//! Same `Mutex`/`HashMap`-behind-a-trait shape as the SQLite store's
//! counterpart, spread across every aggregate the data model defines, plus
//! an advisory per-event lock table and a `tokio::sync::broadcast` change
//! bus for `AssignmentStore`. Suitable for tests and single-process
//! deployments; `SqliteStore` is the persistent counterpart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;

use crate::domain::entities::{
    Assignment, AssignmentId, Blackout, BlackoutId, CalendarToken, Event, EventId, Organization,
    OrgId, Person, PersonId, Solution, SolutionId, Team, TeamId, TokenResolution,
};
use crate::domain::repositories::{
    AssignmentStore, BlackoutRepository, CalendarTokenStore, EventRepository, OrganizationRepository,
    PersonRepository, TeamRepository,
};
use crate::domain::value_objects::{ChangeEvent, ChangeKind};
use crate::domain::{RosterError, RosterResult};

const CHANGE_BUS_CAPACITY: usize = 1024;

#[derive(Default)]
pub struct InMemoryOrganizationRepository {
    orgs: Mutex<HashMap<OrgId, Organization>>,
}

impl InMemoryOrganizationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrganizationRepository for InMemoryOrganizationRepository {
    fn create(&self, org: Organization) -> RosterResult<Organization> {
        let mut orgs = self.orgs.lock().unwrap();
        orgs.insert(org.id, org.clone());
        Ok(org)
    }

    fn get(&self, id: OrgId) -> RosterResult<Organization> {
        self.orgs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("organization", id.to_string()))
    }

    fn update(&self, org: Organization) -> RosterResult<Organization> {
        let mut orgs = self.orgs.lock().unwrap();
        if !orgs.contains_key(&org.id) {
            return Err(RosterError::not_found("organization", org.id.to_string()));
        }
        orgs.insert(org.id, org.clone());
        Ok(org)
    }

    fn list(&self) -> RosterResult<Vec<Organization>> {
        Ok(self.orgs.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryPersonRepository {
    people: Mutex<HashMap<PersonId, Person>>,
}

impl InMemoryPersonRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersonRepository for InMemoryPersonRepository {
    fn create(&self, person: Person) -> RosterResult<Person> {
        let mut people = self.people.lock().unwrap();
        people.insert(person.id, person.clone());
        Ok(person)
    }

    fn get(&self, id: PersonId) -> RosterResult<Person> {
        self.people
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("person", id.to_string()))
    }

    fn update(&self, person: Person) -> RosterResult<Person> {
        let mut people = self.people.lock().unwrap();
        if !people.contains_key(&person.id) {
            return Err(RosterError::not_found("person", person.id.to_string()));
        }
        people.insert(person.id, person.clone());
        Ok(person)
    }

    fn list_by_org(&self, org_id: OrgId) -> RosterResult<Vec<Person>> {
        Ok(self
            .people
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryTeamRepository {
    teams: Mutex<HashMap<TeamId, Team>>,
}

impl InMemoryTeamRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TeamRepository for InMemoryTeamRepository {
    fn create(&self, team: Team) -> RosterResult<Team> {
        let mut teams = self.teams.lock().unwrap();
        teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn get(&self, id: TeamId) -> RosterResult<Team> {
        self.teams
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("team", id.to_string()))
    }

    fn update(&self, team: Team) -> RosterResult<Team> {
        let mut teams = self.teams.lock().unwrap();
        if !teams.contains_key(&team.id) {
            return Err(RosterError::not_found("team", team.id.to_string()));
        }
        teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn list_by_org(&self, org_id: OrgId) -> RosterResult<Vec<Team>> {
        Ok(self
            .teams
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<EventId, Event>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventRepository for InMemoryEventRepository {
    fn create(&self, event: Event) -> RosterResult<Event> {
        let mut events = self.events.lock().unwrap();
        events.insert(event.id, event.clone());
        Ok(event)
    }

    fn get(&self, id: EventId) -> RosterResult<Event> {
        self.events
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("event", id.to_string()))
    }

    fn update(&self, event: Event) -> RosterResult<Event> {
        let mut events = self.events.lock().unwrap();
        if !events.contains_key(&event.id) {
            return Err(RosterError::not_found("event", event.id.to_string()));
        }
        events.insert(event.id, event.clone());
        Ok(event)
    }

    fn list_in_range(&self, org_id: OrgId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Event>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.org_id == org_id && e.start_time < to && e.end_time > from)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryBlackoutRepository {
    blackouts: Mutex<HashMap<BlackoutId, Blackout>>,
}

impl InMemoryBlackoutRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlackoutRepository for InMemoryBlackoutRepository {
    fn create(&self, blackout: Blackout) -> RosterResult<Blackout> {
        let mut blackouts = self.blackouts.lock().unwrap();
        blackouts.insert(blackout.id, blackout.clone());
        Ok(blackout)
    }

    fn delete(&self, id: BlackoutId) -> RosterResult<()> {
        let mut blackouts = self.blackouts.lock().unwrap();
        blackouts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RosterError::not_found("blackout", id.to_string()))
    }

    fn list_by_person(&self, person_id: PersonId) -> RosterResult<Vec<Blackout>> {
        Ok(self
            .blackouts
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.person_id == person_id)
            .cloned()
            .collect())
    }

    fn list_covering(&self, person_id: PersonId, date: NaiveDate) -> RosterResult<Vec<Blackout>> {
        Ok(self
            .blackouts
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.person_id == person_id && b.covers(date))
            .cloned()
            .collect())
    }
}

struct StoreState {
    solutions: HashMap<SolutionId, Solution>,
    active_solution_by_org: HashMap<OrgId, SolutionId>,
    assignments: HashMap<AssignmentId, Assignment>,
}

/// Owns solutions, assignments, and the per-event advisory locks that
/// serialize concurrent manual edits to the same event. Locks are created
/// lazily and never removed, trading a small permanent map for lock-free
/// reads elsewhere.
///
/// Holds a reference to the event repository solely to resolve an
/// assignment's org for the change bus: `Assignment` itself carries no
/// `org_id`, and a manual assignment has no `Solution` to read one from.
pub struct InMemoryAssignmentStore {
    state: Mutex<StoreState>,
    event_locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
    changes: broadcast::Sender<ChangeEvent>,
    events: Arc<dyn EventRepository>,
}

impl InMemoryAssignmentStore {
    pub fn new(events: Arc<dyn EventRepository>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self {
            state: Mutex::new(StoreState {
                solutions: HashMap::new(),
                active_solution_by_org: HashMap::new(),
                assignments: HashMap::new(),
            }),
            event_locks: Mutex::new(HashMap::new()),
            changes,
            events,
        }
    }

    fn lock_for_event(&self, event_id: EventId) -> Arc<Mutex<()>> {
        self.event_locks
            .lock()
            .unwrap()
            .entry(event_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn emit(&self, kind: ChangeKind, org_id: OrgId, entity_id: impl Into<String>) {
        let _ = self.changes.send(ChangeEvent::new(kind, org_id, entity_id, Utc::now()));
    }
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn bulk_write(&self, solution: Solution, assignments: Vec<Assignment>) -> RosterResult<Solution> {
        let org_id = solution.org_id;
        let solution_id = solution.id;
        let mut state = self.state.lock().unwrap();
        let prior_active = state.active_solution_by_org.get(&org_id).copied();
        state.assignments.retain(|_, a| {
            a.solution_id
                .map(|sid| prior_active != Some(sid))
                .unwrap_or(true)
        });
        for assignment in assignments {
            state.assignments.insert(assignment.id, assignment);
        }
        state.solutions.insert(solution_id, solution.clone());
        state.active_solution_by_org.insert(org_id, solution_id);
        drop(state);
        self.emit(ChangeKind::SolutionPublished, org_id, solution_id.to_string());
        Ok(solution)
    }

    fn active_solution(&self, org_id: OrgId) -> RosterResult<Option<Solution>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .active_solution_by_org
            .get(&org_id)
            .and_then(|id| state.solutions.get(id))
            .cloned())
    }

    fn get_solution(&self, id: SolutionId) -> RosterResult<Solution> {
        self.state
            .lock()
            .unwrap()
            .solutions
            .get(&id)
            .cloned()
            .ok_or_else(|| RosterError::not_found("solution", id.to_string()))
    }

    fn assign(&self, assignment: Assignment) -> RosterResult<Assignment> {
        let event_lock = self.lock_for_event(assignment.event_id);
        let _guard = event_lock.lock().unwrap();

        let mut state = self.state.lock().unwrap();
        let clashes = state.assignments.values().any(|a| a.key() == assignment.key());
        if clashes {
            return Err(RosterError::Conflict {
                event_id: assignment.event_id,
                person_id: assignment.person_id,
                role: assignment.role.clone(),
            });
        }
        state.assignments.insert(assignment.id, assignment.clone());
        drop(state);

        if let Ok(event) = self.events.get(assignment.event_id) {
            self.emit(ChangeKind::AssignmentCreated, event.org_id, assignment.id.to_string());
        }
        Ok(assignment)
    }

    fn unassign(&self, id: AssignmentId) -> RosterResult<()> {
        let mut state = self.state.lock().unwrap();
        let removed = state
            .assignments
            .remove(&id)
            .ok_or_else(|| RosterError::assignment_not_found(id))?;
        drop(state);

        if let Ok(event) = self.events.get(removed.event_id) {
            self.emit(ChangeKind::AssignmentRemoved, event.org_id, id.to_string());
        }
        Ok(())
    }

    fn swap(
        &self,
        unassign_a: AssignmentId,
        unassign_b: AssignmentId,
        new_a: Assignment,
        new_b: Assignment,
    ) -> RosterResult<(Assignment, Assignment)> {
        let mut event_ids = vec![new_a.event_id, new_b.event_id];
        event_ids.sort_by_key(|id| id.as_uuid());
        event_ids.dedup();
        let locks: Vec<_> = event_ids.iter().map(|id| self.lock_for_event(*id)).collect();
        let _guards: Vec<_> = locks.iter().map(|l| l.lock().unwrap()).collect();

        let mut state = self.state.lock().unwrap();
        if !state.assignments.contains_key(&unassign_a) {
            return Err(RosterError::assignment_not_found(unassign_a));
        }
        if !state.assignments.contains_key(&unassign_b) {
            return Err(RosterError::assignment_not_found(unassign_b));
        }
        let clashes = |candidate: &Assignment| {
            state.assignments.values().any(|a| {
                a.id != unassign_a && a.id != unassign_b && a.key() == candidate.key()
            })
        };
        if clashes(&new_a) {
            return Err(RosterError::Conflict {
                event_id: new_a.event_id,
                person_id: new_a.person_id,
                role: new_a.role.clone(),
            });
        }
        if clashes(&new_b) {
            return Err(RosterError::Conflict {
                event_id: new_b.event_id,
                person_id: new_b.person_id,
                role: new_b.role.clone(),
            });
        }

        state.assignments.remove(&unassign_a);
        state.assignments.remove(&unassign_b);
        state.assignments.insert(new_a.id, new_a.clone());
        state.assignments.insert(new_b.id, new_b.clone());
        drop(state);

        if let Ok(event) = self.events.get(new_a.event_id) {
            self.emit(ChangeKind::AssignmentCreated, event.org_id, new_a.id.to_string());
        }
        if let Ok(event) = self.events.get(new_b.event_id) {
            self.emit(ChangeKind::AssignmentCreated, event.org_id, new_b.id.to_string());
        }
        Ok((new_a, new_b))
    }

    fn get_assignment(&self, id: AssignmentId) -> RosterResult<Assignment> {
        self.state
            .lock()
            .unwrap()
            .assignments
            .get(&id)
            .cloned()
            .ok_or_else(|| RosterError::assignment_not_found(id))
    }

    fn list_for_event(&self, event_id: EventId) -> RosterResult<Vec<Assignment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .assignments
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect())
    }

    fn list_for_person(&self, person_id: PersonId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Assignment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .assignments
            .values()
            .filter(|a| a.person_id == person_id && a.assigned_at >= from && a.assigned_at <= to)
            .cloned()
            .collect())
    }

    fn list_for_org(&self, org_id: OrgId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Assignment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .assignments
            .values()
            .filter(|a| {
                let in_org = self
                    .events
                    .get(a.event_id)
                    .map(|e| e.org_id == org_id)
                    .unwrap_or(false);
                in_org && a.assigned_at >= from && a.assigned_at <= to
            })
            .cloned()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

struct RetiredToken {
    token: CalendarToken,
    consumed: bool,
}

struct TokenRecord {
    current: CalendarToken,
    retired: Option<RetiredToken>,
}

#[derive(Default)]
pub struct InMemoryCalendarTokenStore {
    tokens: Mutex<HashMap<PersonId, TokenRecord>>,
}

impl InMemoryCalendarTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalendarTokenStore for InMemoryCalendarTokenStore {
    fn issue(&self, person_id: PersonId, at: DateTime<Utc>) -> RosterResult<String> {
        let (entity, plaintext) = CalendarToken::issue(person_id, at);
        self.tokens.lock().unwrap().insert(
            person_id,
            TokenRecord {
                current: entity,
                retired: None,
            },
        );
        Ok(plaintext)
    }

    fn rotate(&self, person_id: PersonId, at: DateTime<Utc>) -> RosterResult<String> {
        let (entity, plaintext) = CalendarToken::issue(person_id, at);
        let mut tokens = self.tokens.lock().unwrap();
        let retired = tokens.remove(&person_id).map(|prev| RetiredToken {
            token: prev.current,
            consumed: false,
        });
        tokens.insert(
            person_id,
            TokenRecord {
                current: entity,
                retired,
            },
        );
        Ok(plaintext)
    }

    fn resolve(&self, plaintext: &str) -> RosterResult<TokenResolution> {
        let mut tokens = self.tokens.lock().unwrap();
        for (person_id, record) in tokens.iter_mut() {
            if record.current.matches(plaintext) {
                return Ok(TokenResolution::Active(*person_id));
            }
            if let Some(retired) = &mut record.retired {
                if !retired.consumed && retired.token.matches(plaintext) {
                    retired.consumed = true;
                    return Ok(TokenResolution::Retired(*person_id));
                }
            }
        }
        Err(RosterError::not_found("calendar_token", "<redacted>"))
    }

    fn get(&self, person_id: PersonId) -> RosterResult<CalendarToken> {
        self.tokens
            .lock()
            .unwrap()
            .get(&person_id)
            .map(|r| r.current.clone())
            .ok_or_else(|| RosterError::not_found("calendar_token", person_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Organization, Solution};

    fn store() -> InMemoryAssignmentStore {
        InMemoryAssignmentStore::new(Arc::new(InMemoryEventRepository::new()))
    }

    #[test]
    fn assign_then_get_round_trips() {
        let store = store();
        let assignment = Assignment::new_manual(EventId::new(), PersonId::new(), "usher".into(), Utc::now());
        let id = assignment.id;
        store.assign(assignment).unwrap();
        assert_eq!(store.get_assignment(id).unwrap().id, id);
    }

    #[test]
    fn duplicate_key_assign_is_conflict() {
        let store = store();
        let event_id = EventId::new();
        let person_id = PersonId::new();
        let a1 = Assignment::new_manual(event_id, person_id, "usher".into(), Utc::now());
        let a2 = Assignment::new_manual(event_id, person_id, "usher".into(), Utc::now());
        store.assign(a1).unwrap();
        assert!(matches!(store.assign(a2), Err(RosterError::Conflict { .. })));
    }

    #[test]
    fn bulk_write_becomes_active_solution() {
        let store = store();
        let org_id = OrgId::new();
        let solution = Solution::new(org_id, Utc::now());
        let solution_id = solution.id;
        let assignment = Assignment::new_solved(solution_id, EventId::new(), PersonId::new(), "usher".into(), Utc::now());
        store.bulk_write(solution, vec![assignment]).unwrap();
        assert_eq!(store.active_solution(org_id).unwrap().unwrap().id, solution_id);
    }

    #[test]
    fn calendar_token_round_trips_by_plaintext() {
        let store = InMemoryCalendarTokenStore::new();
        let person_id = PersonId::new();
        let plaintext = store.issue(person_id, Utc::now()).unwrap();
        assert_eq!(store.resolve(&plaintext).unwrap(), TokenResolution::Active(person_id));
    }

    #[test]
    fn rotated_token_resolves_retired_exactly_once() {
        let store = InMemoryCalendarTokenStore::new();
        let person_id = PersonId::new();
        let first = store.issue(person_id, Utc::now()).unwrap();
        let second = store.rotate(person_id, Utc::now()).unwrap();

        assert_eq!(store.resolve(&second).unwrap(), TokenResolution::Active(person_id));
        assert_eq!(store.resolve(&first).unwrap(), TokenResolution::Retired(person_id));
        assert!(store.resolve(&first).is_err());
    }

    #[test]
    fn swap_replaces_both_assignments_atomically() {
        let store = store();
        let event_a = EventId::new();
        let event_b = EventId::new();
        let person_a = PersonId::new();
        let person_b = PersonId::new();

        let a = Assignment::new_manual(event_a, person_a, "usher".into(), Utc::now());
        let b = Assignment::new_manual(event_b, person_b, "greeter".into(), Utc::now());
        let id_a = a.id;
        let id_b = b.id;
        store.assign(a).unwrap();
        store.assign(b).unwrap();

        let new_a = Assignment::new_manual(event_a, person_b, "usher".into(), Utc::now());
        let new_b = Assignment::new_manual(event_b, person_a, "greeter".into(), Utc::now());
        let (committed_a, committed_b) = store.swap(id_a, id_b, new_a, new_b).unwrap();

        assert!(store.get_assignment(id_a).is_err());
        assert!(store.get_assignment(id_b).is_err());
        assert_eq!(store.get_assignment(committed_a.id).unwrap().person_id, person_b);
        assert_eq!(store.get_assignment(committed_b.id).unwrap().person_id, person_a);
    }

    #[test]
    fn org_repository_rejects_update_of_unknown_org() {
        let repo = InMemoryOrganizationRepository::new();
        let org = Organization::new("Acme", "America/New_York");
        assert!(repo.update(org).is_err());
    }
}
