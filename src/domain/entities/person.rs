//! Person entity module
//!
//! A Person has a set of role capabilities (what they *can* do); the
//! specific role used for any one assignment is recorded on the
//! Assignment, not here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{OrgId, PersonId};

/// A schedulable member of an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub org_id: OrgId,
    pub email: String,
    pub name: String,
    pub roles: HashSet<String>,
    /// IANA timezone; falls back to the organization's timezone when absent.
    pub timezone: Option<String>,
    pub language: Option<String>,
    pub is_archived: bool,
}

impl Person {
    pub fn new(org_id: OrgId, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: PersonId::new(),
            org_id,
            email: normalize_email(email.into()),
            name: name.into(),
            roles: HashSet::new(),
            timezone: None,
            language: None,
            is_archived: false,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn can_perform(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Resolves the timezone this person's local dates should be computed
    /// in, falling back to the organization default when unset.
    pub fn effective_timezone<'a>(&'a self, org_default: &'a str) -> &'a str {
        self.timezone.as_deref().unwrap_or(org_default)
    }
}

/// Normalizes an email the way the data model requires: lowercase, trimmed.
pub fn normalize_email(email: String) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrgId {
        OrgId::new()
    }

    #[test]
    fn normalizes_email_on_construction() {
        let person = Person::new(org(), "  Alice@Example.COM ", "Alice");
        assert_eq!(person.email, "alice@example.com");
    }

    #[test]
    fn can_perform_reflects_assigned_roles() {
        let person = Person::new(org(), "a@b.com", "Alice").with_role("usher");
        assert!(person.can_perform("usher"));
        assert!(!person.can_perform("greeter"));
    }

    #[test]
    fn effective_timezone_falls_back_to_org_default() {
        let person = Person::new(org(), "a@b.com", "Alice");
        assert_eq!(person.effective_timezone("America/New_York"), "America/New_York");
    }

    #[test]
    fn effective_timezone_prefers_person_override() {
        let mut person = Person::new(org(), "a@b.com", "Alice");
        person.timezone = Some("Europe/Berlin".to_string());
        assert_eq!(person.effective_timezone("America/New_York"), "Europe/Berlin");
    }
}
