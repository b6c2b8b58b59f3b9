//! Blocked reason value object module

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why `AvailabilityIndex::blocked_reason` refused a person for an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    Blackout,
    MissingRole,
    Archived,
    DoubleBooked,
}

impl BlockedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockedReason::Blackout => "blackout",
            BlockedReason::MissingRole => "missing_role",
            BlockedReason::Archived => "archived",
            BlockedReason::DoubleBooked => "double_booked",
        }
    }
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&BlockedReason::DoubleBooked).unwrap();
        assert_eq!(json, "\"double_booked\"");
    }
}
