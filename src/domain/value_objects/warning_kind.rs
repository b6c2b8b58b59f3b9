//! Validation warning kind value object module

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `kind` discriminant of a `ValidationWarning`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Shortage,
    BlockedAssignment,
    MissingRole,
    DoubleBooking,
    ArchivedPerson,
    Overfill,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WarningKind::Shortage => "shortage",
            WarningKind::BlockedAssignment => "blocked_assignment",
            WarningKind::MissingRole => "missing_role",
            WarningKind::DoubleBooking => "double_booking",
            WarningKind::ArchivedPerson => "archived_person",
            WarningKind::Overfill => "overfill",
        };
        write!(f, "{s}")
    }
}
