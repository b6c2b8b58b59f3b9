//! Availability Index service module
//!
//! This service builds a read-only snapshot of who can serve where, answering
//! the four queries the scheduler and validator both lean on: point
//! availability, candidate enumeration, blocked-reason explanation, and
//! workload counts for fairness.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::domain::entities::{Assignment, Blackout, Event, EventId, Person, PersonId};
use crate::domain::value_objects::BlockedReason;

/// Per-person blackout calendar, kept as a start-sorted interval list so the
/// blocked test is a binary search rather than a linear scan.
#[derive(Debug, Default, Clone)]
struct BlackoutCalendar {
    /// Sorted by `start_date`; ranges are inclusive on both ends.
    intervals: Vec<(NaiveDate, NaiveDate)>,
}

impl BlackoutCalendar {
    fn build(mut intervals: Vec<(NaiveDate, NaiveDate)>) -> Self {
        intervals.sort_by_key(|(start, _)| *start);
        Self { intervals }
    }

    /// Whether `date` falls within any kept interval, inclusive.
    ///
    /// Uses `partition_point` to find the last interval that could start on
    /// or before `date`, then only needs to look backwards from there since
    /// blackouts in this domain are short and rarely overlapping.
    fn covers(&self, date: NaiveDate) -> bool {
        let cut = self.intervals.partition_point(|(start, _)| *start <= date);
        self.intervals[..cut]
            .iter()
            .rev()
            .take_while(|(start, _)| *start <= date)
            .any(|(_, end)| date <= *end)
    }
}

/// A read-only snapshot of people, their role bitsets, blackout calendars,
/// and the assignments already on the books, frozen at `build()` time.
///
/// Built once per solve (or once per validation call) from immutable data;
/// never mutated afterwards, so it is safely shared across threads.
pub struct AvailabilityIndex {
    people: HashMap<PersonId, Person>,
    blackouts: HashMap<PersonId, BlackoutCalendar>,
    /// event_id -> (person_id, role) assignments already committed, used for
    /// the double-booking and workload queries.
    assignments_by_person: HashMap<PersonId, Vec<(EventId, DateTime<Utc>, DateTime<Utc>)>>,
    org_default_timezone: String,
}

impl AvailabilityIndex {
    /// Builds an index from immutable snapshots of people, blackouts, and
    /// pre-existing assignments (joined against the events they reference).
    ///
    /// # Arguments
    ///
    /// * `people` - every person in the org the solver/validator may consider
    /// * `blackouts` - all blackout rows for those people
    /// * `existing` - assignment/event pairs already committed, used to seed
    ///   double-booking and workload state
    /// * `org_default_timezone` - fallback IANA timezone for people with none
    pub fn build(
        people: Vec<Person>,
        blackouts: Vec<Blackout>,
        existing: Vec<(Assignment, Event)>,
        org_default_timezone: impl Into<String>,
    ) -> Self {
        let mut blackouts_by_person: HashMap<PersonId, Vec<(NaiveDate, NaiveDate)>> = HashMap::new();
        for b in blackouts {
            blackouts_by_person
                .entry(b.person_id)
                .or_default()
                .push((b.start_date, b.end_date));
        }

        let mut assignments_by_person: HashMap<PersonId, Vec<(EventId, DateTime<Utc>, DateTime<Utc>)>> =
            HashMap::new();
        for (assignment, event) in existing {
            assignments_by_person
                .entry(assignment.person_id)
                .or_default()
                .push((event.id, event.start_time, event.end_time));
        }

        let blackouts = blackouts_by_person
            .into_iter()
            .map(|(person_id, intervals)| (person_id, BlackoutCalendar::build(intervals)))
            .collect();

        let people = people.into_iter().map(|p| (p.id, p)).collect();

        Self {
            people,
            blackouts,
            assignments_by_person,
            org_default_timezone: org_default_timezone.into(),
        }
    }

    fn timezone_of(&self, person: &Person) -> Tz {
        let name = person.effective_timezone(&self.org_default_timezone);
        name.parse::<Tz>().unwrap_or(Tz::UTC)
    }

    /// Converts an event's UTC start instant to the person's local calendar
    /// date — the single authoritative rule for comparing instants against
    /// date-only blackouts.
    fn local_start_date(&self, person: &Person, event: &Event) -> NaiveDate {
        event.start_time.with_timezone(&self.timezone_of(person)).date_naive()
    }

    fn is_blacked_out(&self, person: &Person, event: &Event) -> bool {
        let local_date = self.local_start_date(person, event);
        self.blackouts
            .get(&person.id)
            .is_some_and(|cal| cal.covers(local_date))
    }

    fn is_double_booked(&self, person_id: PersonId, event: &Event) -> bool {
        self.assignments_by_person
            .get(&person_id)
            .into_iter()
            .flatten()
            .any(|(event_id, start, end)| {
                *event_id != event.id && ranges_overlap(*start, *end, event.start_time, event.end_time)
            })
    }

    /// Query 1: is this person usable for this event at all (ignoring role)?
    pub fn available(&self, person_id: PersonId, event: &Event) -> bool {
        self.blocked_reason_for(person_id, event).is_none()
    }

    /// Query 3: the reason this person is blocked for this event, or `None`
    /// if they're free to be assigned. Role capability is not checked here
    /// — callers that need a role-specific answer check `Person::can_perform`
    /// themselves (as `candidates` and `ValidationEngine` do) before asking
    /// this query about blackout/double-booking.
    pub fn blocked_reason_for(&self, person_id: PersonId, event: &Event) -> Option<BlockedReason> {
        let Some(person) = self.people.get(&person_id) else {
            return Some(BlockedReason::Archived);
        };
        if person.is_archived {
            return Some(BlockedReason::Archived);
        }
        if self.is_blacked_out(person, event) {
            return Some(BlockedReason::Blackout);
        }
        if self.is_double_booked(person_id, event) {
            return Some(BlockedReason::DoubleBooked);
        }
        None
    }

    /// Query 2: candidate persons for `role` on `event`, excluding blocked
    /// and double-booked people, ordered by ascending person id for
    /// deterministic downstream tie-breaking.
    pub fn candidates(&self, event: &Event, role: &str) -> Vec<PersonId> {
        let mut out: Vec<PersonId> = self
            .people
            .values()
            .filter(|p| !p.is_archived && p.can_perform(role))
            .filter(|p| !self.is_blacked_out(p, event))
            .filter(|p| !self.is_double_booked(p.id, event))
            .map(|p| p.id)
            .collect();
        out.sort_by_key(|id| id.as_uuid());
        out
    }

    /// Query 4: how many assignments `person_id` already has whose event
    /// overlaps `[window_start, window_end)`, used to drive fairness
    /// (S2) and least-used-person value ordering.
    pub fn workload(&self, person_id: PersonId, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> u32 {
        self.assignments_by_person
            .get(&person_id)
            .into_iter()
            .flatten()
            .filter(|(_, start, end)| ranges_overlap(*start, *end, window_start, window_end))
            .count() as u32
    }

    /// Registers a freshly made assignment so later queries in the same
    /// solve see it (the solver calls this as it commits each variable).
    pub fn record_assignment(&mut self, person_id: PersonId, event: &Event) {
        self.assignments_by_person
            .entry(person_id)
            .or_default()
            .push((event.id, event.start_time, event.end_time));
    }

    /// Undoes a single `record_assignment` for `(person_id, event_id)`,
    /// letting the solver backtrack a tentative choice.
    pub fn retract_assignment(&mut self, person_id: PersonId, event_id: EventId) {
        if let Some(entries) = self.assignments_by_person.get_mut(&person_id) {
            if let Some(pos) = entries.iter().position(|(id, _, _)| *id == event_id) {
                entries.remove(pos);
            }
        }
    }

    pub fn person(&self, person_id: PersonId) -> Option<&Person> {
        self.people.get(&person_id)
    }

    pub fn known_person_ids(&self) -> HashSet<PersonId> {
        self.people.keys().copied().collect()
    }
}

/// Half-open overlap test shared by H3 double-booking and the fairness
/// window query: `[a_start, a_end)` intersects `[b_start, b_end)`.
fn ranges_overlap(a_start: DateTime<Utc>, a_end: DateTime<Utc>, b_start: DateTime<Utc>, b_end: DateTime<Utc>) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn person(org: crate::domain::entities::OrgId, roles: &[&str]) -> Person {
        let mut p = Person::new(org, "volunteer@example.org".to_string(), "Vol".to_string());
        for r in roles {
            p = p.with_role(r.to_string());
        }
        p
    }

    fn event(org: crate::domain::entities::OrgId, start: DateTime<Utc>, end: DateTime<Utc>) -> Event {
        Event::new(org, "service", start, end).with_demand("usher", 1)
    }

    #[test]
    fn blackout_on_same_local_date_blocks() {
        let org = crate::domain::entities::OrgId::new();
        let mut p = person(org, &["usher"]);
        p.timezone = Some("America/New_York".to_string());
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 14, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let e = event(org, start, end);
        let blackout = Blackout::new(
            p.id,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        );
        let index = AvailabilityIndex::build(vec![p.clone()], vec![blackout], vec![], "UTC");
        assert_eq!(index.blocked_reason_for(p.id, &e), Some(BlockedReason::Blackout));
    }

    #[test]
    fn double_booking_blocks_overlapping_event() {
        let org = crate::domain::entities::OrgId::new();
        let p = person(org, &["usher"]);
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
        let committed = event(org, start, end);

        let overlap_start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap();
        let overlap_end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 30, 0).unwrap();
        let e2 = event(org, overlap_start, overlap_end);

        let assignment = Assignment::new_manual(committed.id, p.id, "usher".to_string(), Utc::now());
        let index = AvailabilityIndex::build(vec![p.clone()], vec![], vec![(assignment, committed)], "UTC");
        assert_eq!(index.blocked_reason_for(p.id, &e2), Some(BlockedReason::DoubleBooked));
    }

    #[test]
    fn candidates_excludes_archived_and_role_mismatch() {
        let org = crate::domain::entities::OrgId::new();
        let usher = person(org, &["usher"]);
        let mut archived = person(org, &["usher"]);
        archived.is_archived = true;
        let greeter_only = person(org, &["greeter"]);
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
        let e = event(org, start, end);

        let index = AvailabilityIndex::build(
            vec![usher.clone(), archived, greeter_only],
            vec![],
            vec![],
            "UTC",
        );
        assert_eq!(index.candidates(&e, "usher"), vec![usher.id]);
    }
}
