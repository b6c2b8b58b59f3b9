//! Assignment entity module

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AssignmentId, EventId, PersonId, SolutionId};

/// A single person-to-role binding on one event.
///
/// Uniqueness is enforced by the store on `(event_id, person_id, role)`:
/// a person cannot hold the same role twice on the same event, though
/// H5 additionally forbids a person from holding *any* second role on
/// the same event at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    /// `None` for a manual assignment made outside any solver run.
    pub solution_id: Option<SolutionId>,
    pub event_id: EventId,
    pub person_id: PersonId,
    pub role: String,
    pub is_manual: bool,
    pub assigned_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new_manual(event_id: EventId, person_id: PersonId, role: String, at: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::new(),
            solution_id: None,
            event_id,
            person_id,
            role,
            is_manual: true,
            assigned_at: at,
        }
    }

    pub fn new_solved(
        solution_id: SolutionId,
        event_id: EventId,
        person_id: PersonId,
        role: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            solution_id: Some(solution_id),
            event_id,
            person_id,
            role,
            is_manual: false,
            assigned_at: at,
        }
    }

    /// The (event, person, role) key the store treats as unique.
    pub fn key(&self) -> (EventId, PersonId, &str) {
        (self.event_id, self.person_id, self.role.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_assignment_has_no_solution() {
        let a = Assignment::new_manual(EventId::new(), PersonId::new(), "usher".into(), Utc::now());
        assert!(a.solution_id.is_none());
        assert!(a.is_manual);
    }

    #[test]
    fn solved_assignment_carries_solution_id() {
        let solution_id = SolutionId::new();
        let a = Assignment::new_solved(
            solution_id,
            EventId::new(),
            PersonId::new(),
            "usher".into(),
            Utc::now(),
        );
        assert_eq!(a.solution_id, Some(solution_id));
        assert!(!a.is_manual);
    }
}
