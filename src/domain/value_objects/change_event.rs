//! Change-bus event value object
//!
//! Emitted at-least-once whenever a write touches assignments or the
//! entities they depend on, so that a calendar feed cache (or any other
//! subscriber) knows when to invalidate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::OrgId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    AssignmentCreated,
    AssignmentRemoved,
    SolutionPublished,
    EventChanged,
    BlackoutChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub org_id: OrgId,
    /// Stringified id of whichever entity changed (event, assignment,
    /// solution, blackout); kept untyped since subscribers only use it
    /// for logging and cache-key comparisons, not lookups.
    pub entity_id: String,
    pub at: DateTime<Utc>,
    pub actor_id: Option<String>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, org_id: OrgId, entity_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            org_id,
            entity_id: entity_id.into(),
            at,
            actor_id: None,
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}
