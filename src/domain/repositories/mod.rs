//! Repository trait definitions
//!
//! A small trait per aggregate, `RosterResult`-returning methods, shared
//! across the in-memory and SQLite-backed implementations.

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;

use crate::domain::entities::{
    Assignment, AssignmentId, Blackout, BlackoutId, CalendarToken, Event, EventId, Organization,
    OrgId, Person, PersonId, Solution, SolutionId, Team, TeamId, TokenResolution,
};
use crate::domain::value_objects::ChangeEvent;
use crate::domain::RosterResult;

#[cfg_attr(test, mockall::automock)]
pub trait OrganizationRepository: Send + Sync {
    fn create(&self, org: Organization) -> RosterResult<Organization>;
    fn get(&self, id: OrgId) -> RosterResult<Organization>;
    fn update(&self, org: Organization) -> RosterResult<Organization>;
    fn list(&self) -> RosterResult<Vec<Organization>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait PersonRepository: Send + Sync {
    fn create(&self, person: Person) -> RosterResult<Person>;
    fn get(&self, id: PersonId) -> RosterResult<Person>;
    fn update(&self, person: Person) -> RosterResult<Person>;
    fn list_by_org(&self, org_id: OrgId) -> RosterResult<Vec<Person>>;
}

pub trait TeamRepository: Send + Sync {
    fn create(&self, team: Team) -> RosterResult<Team>;
    fn get(&self, id: TeamId) -> RosterResult<Team>;
    fn update(&self, team: Team) -> RosterResult<Team>;
    fn list_by_org(&self, org_id: OrgId) -> RosterResult<Vec<Team>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait EventRepository: Send + Sync {
    fn create(&self, event: Event) -> RosterResult<Event>;
    fn get(&self, id: EventId) -> RosterResult<Event>;
    fn update(&self, event: Event) -> RosterResult<Event>;
    fn list_in_range(
        &self,
        org_id: OrgId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RosterResult<Vec<Event>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait BlackoutRepository: Send + Sync {
    fn create(&self, blackout: Blackout) -> RosterResult<Blackout>;
    fn delete(&self, id: BlackoutId) -> RosterResult<()>;
    fn list_by_person(&self, person_id: PersonId) -> RosterResult<Vec<Blackout>>;
    fn list_covering(&self, person_id: PersonId, date: NaiveDate) -> RosterResult<Vec<Blackout>>;
}

/// Owns both solutions and the assignments that belong to them, plus
/// manual (solution-less) assignments. `bulk_write` replaces an org's
/// prior active solution atomically; `assign`/`unassign` take an
/// advisory per-event lock so concurrent manual edits on different
/// events never block each other.
#[cfg_attr(test, mockall::automock)]
pub trait AssignmentStore: Send + Sync {
    fn bulk_write(&self, solution: Solution, assignments: Vec<Assignment>) -> RosterResult<Solution>;
    fn active_solution(&self, org_id: OrgId) -> RosterResult<Option<Solution>>;
    fn get_solution(&self, id: SolutionId) -> RosterResult<Solution>;

    fn assign(&self, assignment: Assignment) -> RosterResult<Assignment>;
    fn unassign(&self, id: AssignmentId) -> RosterResult<()>;
    fn get_assignment(&self, id: AssignmentId) -> RosterResult<Assignment>;

    /// Replaces two assignments with two new ones as a single atomic step:
    /// either both removals and both insertions are visible to a concurrent
    /// reader, or none of them are. Implementations must not let a reader
    /// observe either assignment missing without its replacement present.
    fn swap(
        &self,
        unassign_a: AssignmentId,
        unassign_b: AssignmentId,
        new_a: Assignment,
        new_b: Assignment,
    ) -> RosterResult<(Assignment, Assignment)>;

    fn list_for_event(&self, event_id: EventId) -> RosterResult<Vec<Assignment>>;
    fn list_for_person(&self, person_id: PersonId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Assignment>>;
    fn list_for_org(&self, org_id: OrgId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Assignment>>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[cfg_attr(test, mockall::automock)]
pub trait CalendarTokenStore: Send + Sync {
    /// Issues a fresh token for a person, returning the plaintext once.
    fn issue(&self, person_id: PersonId, at: DateTime<Utc>) -> RosterResult<String>;
    /// Issues a fresh token, retiring the prior one (if any) rather than
    /// discarding it outright: the prior token still resolves, exactly
    /// once, to `TokenResolution::Retired`.
    fn rotate(&self, person_id: PersonId, at: DateTime<Utc>) -> RosterResult<String>;
    /// Resolves a presented plaintext token back to its owning person,
    /// distinguishing a currently active token from a just-retired one.
    fn resolve(&self, plaintext: &str) -> RosterResult<TokenResolution>;
    fn get(&self, person_id: PersonId) -> RosterResult<CalendarToken>;
}
