//! List Assignments use case
//!
//! `list_assignments(org_id, window) -> Assignment[]` from §6.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entities::{Assignment, OrgId};
use crate::domain::repositories::AssignmentStore;
use crate::domain::RosterResult;

pub struct ListAssignments {
    store: Arc<dyn AssignmentStore>,
}

impl ListAssignments {
    pub fn new(store: Arc<dyn AssignmentStore>) -> Self {
        Self { store }
    }

    pub fn execute(&self, org_id: OrgId, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> RosterResult<Vec<Assignment>> {
        self.store.list_for_org(org_id, window_start, window_end)
    }
}
