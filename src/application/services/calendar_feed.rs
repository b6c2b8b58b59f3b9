//! Calendar Feed service module
//!
//! Orchestrates ICS generation for a single person or a whole organization:
//! resolves the caller's token, reads the current assignments from the
//! store, and delegates text formatting to
//! `infrastructure::output::ics_generator`. Regeneration is on-demand; a
//! small in-process TTL cache absorbs repeated fetches of an unchanged feed.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::domain::entities::{EventId, OrgId, PersonId, TokenResolution};
use crate::domain::repositories::{AssignmentStore, CalendarTokenStore, EventRepository, PersonRepository};
use crate::domain::RosterResult;
use crate::infrastructure::output::ics_generator::{CalendarEntry, IcsGenerator};

struct CacheEntry {
    rendered: String,
    cached_at: DateTime<Utc>,
}

/// Produces per-person and per-org ICS feeds. Holds a small TTL-bounded
/// cache keyed by the caller's opaque key (person token, or org id string
/// for org feeds) rather than by last-mutation time, since the store
/// contract doesn't expose a mutation timestamp query; see DESIGN.md.
pub struct CalendarFeed {
    store: std::sync::Arc<dyn AssignmentStore>,
    tokens: std::sync::Arc<dyn CalendarTokenStore>,
    people: std::sync::Arc<dyn PersonRepository>,
    events: std::sync::Arc<dyn EventRepository>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    cache_ttl_ms: u64,
    generator: IcsGenerator,
}

impl CalendarFeed {
    pub fn new(
        store: std::sync::Arc<dyn AssignmentStore>,
        tokens: std::sync::Arc<dyn CalendarTokenStore>,
        people: std::sync::Arc<dyn PersonRepository>,
        events: std::sync::Arc<dyn EventRepository>,
        cache_ttl_ms: u64,
    ) -> Self {
        Self {
            store,
            tokens,
            people,
            events,
            cache: Mutex::new(HashMap::new()),
            cache_ttl_ms,
            generator: IcsGenerator::new(),
        }
    }

    fn cached_or<F>(&self, key: &str, render: F) -> String
    where
        F: FnOnce() -> String,
    {
        if self.cache_ttl_ms > 0 {
            let mut cache = self.cache.lock().expect("calendar cache mutex poisoned");
            if let Some(entry) = cache.get(key) {
                let age = Utc::now() - entry.cached_at;
                if age < ChronoDuration::milliseconds(self.cache_ttl_ms as i64) {
                    return entry.rendered.clone();
                }
            }
            let rendered = render();
            cache.insert(
                key.to_string(),
                CacheEntry {
                    rendered: rendered.clone(),
                    cached_at: Utc::now(),
                },
            );
            rendered
        } else {
            render()
        }
    }

    /// `get_person_calendar(token)`: resolves the token to a person, then
    /// lists that person's assignments across a wide window and renders
    /// their VEVENTs with assigned role. A token that was just rotated out
    /// still resolves here, once, to the retirement placeholder instead of
    /// an error.
    pub fn get_person_calendar(&self, token: &str) -> RosterResult<String> {
        match self.tokens.resolve(token)? {
            TokenResolution::Active(person_id) => Ok(self.cached_or(token, || self.render_person(person_id))),
            TokenResolution::Retired(_) => Ok(self.retired_placeholder()),
        }
    }

    fn render_person(&self, person_id: PersonId) -> String {
        let window_start = Utc::now() - ChronoDuration::days(365);
        let window_end = Utc::now() + ChronoDuration::days(365);
        let assignments = self
            .store
            .list_for_person(person_id, window_start, window_end)
            .unwrap_or_default();

        let mut entries = Vec::new();
        for assignment in &assignments {
            if let Ok(event) = self.events.get(assignment.event_id) {
                entries.push(CalendarEntry {
                    event_id: event.id,
                    scope_id: person_id.to_string(),
                    start: event.start_time,
                    end: event.end_time,
                    event_type: event.event_type.clone(),
                    role: Some(assignment.role.clone()),
                    co_assignees: self.co_assignees(event.id, person_id),
                    location: None,
                    shortage: false,
                });
            }
        }
        self.generator.generate_string(&entries, Utc::now())
    }

    /// `get_org_calendar(org_id)`: renders every event in the org, tagging
    /// shortage where filled counts fall short of demand.
    pub fn get_org_calendar(&self, org_id: OrgId) -> RosterResult<String> {
        let cache_key = format!("org:{org_id}");
        Ok(self.cached_or(&cache_key, || self.render_org(org_id)))
    }

    fn render_org(&self, org_id: OrgId) -> String {
        let window_start = Utc::now() - ChronoDuration::days(365);
        let window_end = Utc::now() + ChronoDuration::days(365);
        let events = self.events.list_in_range(org_id, window_start, window_end).unwrap_or_default();

        let mut entries = Vec::new();
        for event in &events {
            let assignments = self.store.list_for_event(event.id).unwrap_or_default();
            let filled: u32 = assignments.len() as u32;
            let shortage = filled < event.total_demand();
            let role_summary = assignments
                .iter()
                .map(|a| a.role.clone())
                .collect::<Vec<_>>()
                .join(", ");

            entries.push(CalendarEntry {
                event_id: event.id,
                scope_id: org_id.to_string(),
                start: event.start_time,
                end: event.end_time,
                event_type: event.event_type.clone(),
                role: if role_summary.is_empty() { None } else { Some(role_summary) },
                co_assignees: Vec::new(),
                location: None,
                shortage,
            });
        }
        self.generator.generate_string(&entries, Utc::now())
    }

    fn co_assignees(&self, event_id: EventId, exclude: PersonId) -> Vec<String> {
        let assignments = self.store.list_for_event(event_id).unwrap_or_default();
        assignments
            .into_iter()
            .filter(|a| a.person_id != exclude)
            .filter_map(|a| self.people.get(a.person_id).ok())
            .map(|p| p.name)
            .collect()
    }

    /// Issued once a token is invalidated: the one grace fetch allowed
    /// before `NOT_FOUND` takes over.
    pub fn retired_placeholder(&self) -> String {
        self.generator.generate_retired_placeholder(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{
        MockAssignmentStore, MockCalendarTokenStore, MockEventRepository, MockPersonRepository,
    };

    fn feed(tokens: MockCalendarTokenStore) -> CalendarFeed {
        CalendarFeed::new(
            std::sync::Arc::new(MockAssignmentStore::new()),
            std::sync::Arc::new(tokens),
            std::sync::Arc::new(MockPersonRepository::new()),
            std::sync::Arc::new(MockEventRepository::new()),
            0,
        )
    }

    #[test]
    fn retired_token_returns_placeholder_not_an_error() {
        let person_id = PersonId::new();
        let mut tokens = MockCalendarTokenStore::new();
        tokens.expect_resolve().returning(move |_| Ok(TokenResolution::Retired(person_id)));

        let ics = feed(tokens).get_person_calendar("stale-token").unwrap();
        assert!(ics.contains("retired"));
        assert!(ics.contains("BEGIN:VCALENDAR"));
    }

    #[test]
    fn unknown_token_still_propagates_not_found() {
        let mut tokens = MockCalendarTokenStore::new();
        tokens.expect_resolve().returning(|_| Err(crate::domain::RosterError::not_found("calendar_token", "<redacted>")));

        assert!(feed(tokens).get_person_calendar("unknown-token").is_err());
    }
}
