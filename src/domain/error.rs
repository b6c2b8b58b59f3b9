//! Core error type
//!
//! Conceptual error kinds for the scheduling core. Only `Internal` is meant
//! to propagate as a hard failure; every other variant is returned wrapped
//! in `Ok(...)` at the use-case boundary as part of a structured result
//! (`ValidationReport`, `AssignmentResult`, `SolveOutcome`) rather than
//! raised.

use thiserror::Error;

use crate::domain::entities::{AssignmentId, EventId, OrgId, PersonId};

/// Structured error kinds surfaced across the public API.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflicting assignment for event {event_id} person {person_id} role {role}")]
    Conflict {
        event_id: EventId,
        person_id: PersonId,
        role: String,
    },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("solver cancelled before completion")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RosterError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        RosterError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn assignment_not_found(id: AssignmentId) -> Self {
        RosterError::NotFound {
            kind: "assignment",
            id: id.to_string(),
        }
    }

    pub fn org_not_found(id: OrgId) -> Self {
        RosterError::NotFound {
            kind: "organization",
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RosterError {
    fn from(err: rusqlite::Error) -> Self {
        RosterError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RosterError {
    fn from(err: serde_json::Error) -> Self {
        RosterError::Internal(err.to_string())
    }
}

pub type RosterResult<T> = std::result::Result<T, RosterError>;
