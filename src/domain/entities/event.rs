//! Event entity module
//!
//! Events carry full UTC instants; comparing them against a Blackout's
//! calendar dates requires converting to the person's local timezone first
//! (see `crate::application::services::availability_index`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, OrgId};

/// Per-role headcount an event requires. Kept as a `BTreeMap` so iteration
/// order (and therefore solver variable ordering tie-breaks) is
/// deterministic across runs.
pub type RoleDemand = BTreeMap<String, u32>;

/// A single occurrence requiring staffing. Recurring series are
/// materialized into one `Event` per occurrence before reaching the
/// scheduler — the scheduler itself has no notion of recurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub org_id: OrgId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub event_type: String,
    pub role_demand: RoleDemand,
    pub recurring_series_id: Option<String>,
    pub exception_of: Option<EventId>,
}

impl Event {
    pub fn new(
        org_id: OrgId,
        event_type: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            org_id,
            start_time,
            end_time,
            event_type: event_type.into(),
            role_demand: RoleDemand::new(),
            recurring_series_id: None,
            exception_of: None,
        }
    }

    pub fn with_demand(mut self, role: impl Into<String>, count: u32) -> Self {
        if count > 0 {
            self.role_demand.insert(role.into(), count);
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.end_time <= self.start_time {
            return Err("event end_time must be strictly after start_time".to_string());
        }
        if self.role_demand.values().any(|&d| d == 0) {
            return Err("role_demand entries must be positive".to_string());
        }
        Ok(())
    }

    /// Whether this event has any role demand at all. An event with empty
    /// demand is trivially valid and the solver leaves it untouched.
    pub fn has_demand(&self) -> bool {
        !self.role_demand.is_empty()
    }

    /// Half-open `[start, end)` overlap test used by the H3 no-double-booking
    /// constraint.
    pub fn overlaps(&self, other: &Event) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn total_demand(&self) -> u32 {
        self.role_demand.values().sum()
    }

    /// Stable calendar UID component: series-qualified when this occurrence
    /// belongs to a recurring series, so edits to the occurrence never
    /// change the UID calendar clients key off of.
    pub fn uid_component(&self) -> String {
        match &self.recurring_series_id {
            Some(series) => format!("{series}-{}", self.id),
            None => self.id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn org() -> OrgId {
        OrgId::new()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn rejects_non_positive_time_range() {
        let event = Event::new(org(), "service", at(11), at(10));
        assert!(event.validate().is_err());
    }

    #[test]
    fn zero_demand_entries_are_dropped_on_construction() {
        let event = Event::new(org(), "service", at(10), at(11)).with_demand("usher", 0);
        assert!(!event.has_demand());
    }

    #[test]
    fn half_open_overlap_excludes_touching_boundary() {
        let e1 = Event::new(org(), "service", at(10), at(11));
        let e2 = Event::new(org(), "service", at(11), at(12));
        assert!(!e1.overlaps(&e2), "events touching at the boundary must not overlap");

        let e3 = Event::new(org(), "service", at(10), at(11)).clone();
        let e4 = Event::new(org(), "service", Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap(), at(12));
        assert!(e3.overlaps(&e4));
    }

    #[test]
    fn uid_component_stable_across_role_changes() {
        let mut event = Event::new(org(), "service", at(10), at(11)).with_demand("usher", 1);
        let uid_before = event.uid_component();
        event.role_demand.insert("greeter".to_string(), 1);
        assert_eq!(uid_before, event.uid_component());
    }
}
