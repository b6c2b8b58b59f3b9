//! Organization entity module
//!
//! An Organization owns people, teams, events, solutions, and calendar
//! tokens; removing one cascades to all of those.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::OrgId;

/// A tenant in the multi-tenant roster system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    /// IANA timezone name, e.g. "America/New_York". Used as the fallback
    /// when a Person has no timezone of their own.
    pub timezone: String,
    /// Arbitrary organization policy, validated only for the subset the
    /// solver interprets (see `OrgPolicy::from_config`).
    pub config: Value,
    pub known_roles: HashSet<String>,
}

impl Organization {
    pub fn new(name: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            id: OrgId::new(),
            name: name.into(),
            timezone: timezone.into(),
            config: Value::Object(serde_json::Map::new()),
            known_roles: HashSet::new(),
        }
    }

    /// Validates the minimal shape required of every organization: a
    /// non-empty timezone string that `chrono_tz` can resolve.
    pub fn validate(&self) -> Result<(), String> {
        if self.timezone.trim().is_empty() {
            return Err("organization timezone must not be empty".to_string());
        }
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| format!("unknown IANA timezone: {}", self.timezone))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_timezone() {
        let org = Organization::new("Acme", "");
        assert!(org.validate().is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let org = Organization::new("Acme", "Mars/Olympus_Mons");
        assert!(org.validate().is_err());
    }

    #[test]
    fn accepts_known_iana_timezone() {
        let org = Organization::new("Acme", "America/New_York");
        assert!(org.validate().is_ok());
    }
}
