//! Validation Engine service module
//!
//! A pure, read-only predicate over `(event, assignments_for_event, index)`.
//! Used by the UI before committing edits and by `ManualAssignmentService`
//! after every write. Never mutates anything it is given.

use serde::{Deserialize, Serialize};

use crate::application::services::availability_index::AvailabilityIndex;
use crate::domain::entities::{Assignment, Event, PersonId};
use crate::domain::value_objects::{BlockedReason, WarningKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    pub role: Option<String>,
    pub person_id: Option<PersonId>,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedAssignment {
    pub person_id: PersonId,
    pub role: String,
    pub reason: BlockedReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub warnings: Vec<ValidationWarning>,
    pub blocked_assignments: Vec<BlockedAssignment>,
}

pub struct ValidationEngine;

impl ValidationEngine {
    /// Evaluates one event's current assignments against the availability
    /// snapshot. Stateless: calling this twice with the same inputs always
    /// returns the same report.
    ///
    /// # Arguments
    ///
    /// * `event` - the event being validated
    /// * `assignments_for_event` - every assignment currently on that event
    /// * `index` - the availability snapshot to check role/blackout/double-booking against
    pub fn validate(event: &Event, assignments_for_event: &[Assignment], index: &AvailabilityIndex) -> ValidationReport {
        let mut warnings = Vec::new();
        let mut blocked_assignments = Vec::new();
        let mut hard_violation = false;

        for (role, demand) in &event.role_demand {
            let filled = assignments_for_event.iter().filter(|a| &a.role == role).count() as u32;
            if filled < *demand {
                warnings.push(ValidationWarning {
                    kind: WarningKind::Shortage,
                    role: Some(role.clone()),
                    person_id: None,
                    detail: format!("role '{role}' needs {demand}, has {filled}"),
                });
                hard_violation = true;
            } else if filled > *demand {
                warnings.push(ValidationWarning {
                    kind: WarningKind::Overfill,
                    role: Some(role.clone()),
                    person_id: None,
                    detail: format!("role '{role}' has {filled}, demand is {demand}"),
                });
                hard_violation = true;
            }
        }

        let mut seen_people: Vec<PersonId> = Vec::new();
        for assignment in assignments_for_event {
            if seen_people.contains(&assignment.person_id) {
                warnings.push(ValidationWarning {
                    kind: WarningKind::DoubleBooking,
                    role: Some(assignment.role.clone()),
                    person_id: Some(assignment.person_id),
                    detail: "person holds more than one role on this event".to_string(),
                });
                blocked_assignments.push(BlockedAssignment {
                    person_id: assignment.person_id,
                    role: assignment.role.clone(),
                    reason: BlockedReason::DoubleBooked,
                });
                hard_violation = true;
                continue;
            }
            seen_people.push(assignment.person_id);

            match index.person(assignment.person_id) {
                None => {
                    warnings.push(ValidationWarning {
                        kind: WarningKind::MissingRole,
                        role: Some(assignment.role.clone()),
                        person_id: Some(assignment.person_id),
                        detail: "assigned person is unknown to this index".to_string(),
                    });
                    hard_violation = true;
                    continue;
                }
                Some(person) => {
                    if person.is_archived {
                        warnings.push(ValidationWarning {
                            kind: WarningKind::ArchivedPerson,
                            role: Some(assignment.role.clone()),
                            person_id: Some(assignment.person_id),
                            detail: "assigned person is archived".to_string(),
                        });
                        blocked_assignments.push(BlockedAssignment {
                            person_id: assignment.person_id,
                            role: assignment.role.clone(),
                            reason: BlockedReason::Archived,
                        });
                        hard_violation = true;
                        continue;
                    }
                    if !person.can_perform(&assignment.role) {
                        warnings.push(ValidationWarning {
                            kind: WarningKind::MissingRole,
                            role: Some(assignment.role.clone()),
                            person_id: Some(assignment.person_id),
                            detail: format!("person lacks capability for role '{}'", assignment.role),
                        });
                        blocked_assignments.push(BlockedAssignment {
                            person_id: assignment.person_id,
                            role: assignment.role.clone(),
                            reason: BlockedReason::MissingRole,
                        });
                        hard_violation = true;
                        continue;
                    }
                }
            }

            if let Some(reason) = index.blocked_reason_for(assignment.person_id, event) {
                warnings.push(ValidationWarning {
                    kind: WarningKind::BlockedAssignment,
                    role: Some(assignment.role.clone()),
                    person_id: Some(assignment.person_id),
                    detail: format!("person is blocked: {reason}"),
                });
                blocked_assignments.push(BlockedAssignment {
                    person_id: assignment.person_id,
                    role: assignment.role.clone(),
                    reason,
                });
                hard_violation = true;
            }
        }

        ValidationReport {
            is_valid: !hard_violation,
            warnings,
            blocked_assignments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{OrgId, Person};
    use chrono::{TimeZone, Utc};

    fn event() -> Event {
        let org = OrgId::new();
        Event::new(
            org,
            "service",
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap(),
        )
        .with_demand("usher", 1)
    }

    #[test]
    fn fully_staffed_event_is_valid() {
        let e = event();
        let person = Person::new(e.org_id, "a@b.com", "A").with_role("usher");
        let index = AvailabilityIndex::build(vec![person.clone()], vec![], vec![], "UTC");
        let assignment = Assignment::new_manual(e.id, person.id, "usher".to_string(), Utc::now());

        let report = ValidationEngine::validate(&e, &[assignment], &index);
        assert!(report.is_valid);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn shortage_marks_invalid_with_warning() {
        let e = event();
        let index = AvailabilityIndex::build(vec![], vec![], vec![], "UTC");
        let report = ValidationEngine::validate(&e, &[], &index);
        assert!(!report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::Shortage);
    }

    #[test]
    fn blocked_person_surfaces_but_is_reported_not_removed() {
        let e = event();
        let mut person = Person::new(e.org_id, "a@b.com", "A").with_role("usher");
        person.is_archived = true;
        let index = AvailabilityIndex::build(vec![person.clone()], vec![], vec![], "UTC");
        let assignment = Assignment::new_manual(e.id, person.id, "usher".to_string(), Utc::now());

        let report = ValidationEngine::validate(&e, &[assignment], &index);
        assert!(!report.is_valid);
        assert_eq!(report.blocked_assignments.len(), 1);
        assert_eq!(report.blocked_assignments[0].reason, BlockedReason::Archived);
    }
}
