//! Validate Event use case
//!
//! `validate_event(event_id) -> ValidationReport` from §6.

use std::sync::Arc;

use chrono::Utc;

use crate::application::services::validation_engine::ValidationReport;
use crate::application::services::ValidationEngine;
use crate::application::use_cases::build_index::BuildIndex;
use crate::domain::entities::EventId;
use crate::domain::repositories::{AssignmentStore, EventRepository, OrganizationRepository};
use crate::domain::RosterResult;

pub struct ValidateEvent {
    build_index: Arc<BuildIndex>,
    events: Arc<dyn EventRepository>,
    store: Arc<dyn AssignmentStore>,
    orgs: Arc<dyn OrganizationRepository>,
}

impl ValidateEvent {
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

    pub fn execute(&self, event_id: EventId) -> RosterResult<ValidationReport> {
        let event = self.events.get(event_id)?;
        let org = self.orgs.get(event.org_id)?;
        let index = self.build_index.execute(event.org_id, Utc::now(), &org.timezone)?;
        let assignments = self.store.list_for_event(event_id)?;
        Ok(ValidationEngine::validate(&event, &assignments, &index))
    }
}
