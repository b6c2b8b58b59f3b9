//! Calendar Ops use case
//!
//! Thin wrapper exposing `get_person_calendar`, `get_org_calendar`, and
//! `rotate_calendar_token` from §6 over `CalendarFeed` and
//! `CalendarTokenStore`.

use std::sync::Arc;

use chrono::Utc;

use crate::application::services::CalendarFeed;
use crate::domain::entities::PersonId;
use crate::domain::repositories::CalendarTokenStore;
use crate::domain::RosterResult;

pub struct CalendarOps {
    feed: Arc<CalendarFeed>,
    tokens: Arc<dyn CalendarTokenStore>,
}

impl CalendarOps {
    pub fn new(feed: Arc<CalendarFeed>, tokens: Arc<dyn CalendarTokenStore>) -> Self {
        Self { feed, tokens }
    }

    pub fn get_person_calendar(&self, token: &str) -> RosterResult<String> {
        self.feed.get_person_calendar(token)
    }

    pub fn get_org_calendar(&self, org_id: crate::domain::entities::OrgId) -> RosterResult<String> {
        self.feed.get_org_calendar(org_id)
    }

    pub fn rotate_calendar_token(&self, person_id: PersonId) -> RosterResult<String> {
        self.tokens.rotate(person_id, Utc::now())
    }
}
