//! Team entity module

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{OrgId, PersonId, TeamId};

/// A named grouping of people within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub org_id: OrgId,
    pub name: String,
    pub member_ids: HashSet<PersonId>,
}

impl Team {
    pub fn new(org_id: OrgId, name: impl Into<String>) -> Self {
        Self {
            id: TeamId::new(),
            org_id,
            name: name.into(),
            member_ids: HashSet::new(),
        }
    }

    pub fn add_member(&mut self, person_id: PersonId) {
        self.member_ids.insert(person_id);
    }

    pub fn contains(&self, person_id: PersonId) -> bool {
        self.member_ids.contains(&person_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_membership() {
        let mut team = Team::new(OrgId::new(), "Worship");
        let p1 = PersonId::new();
        team.add_member(p1);
        assert!(team.contains(p1));
        assert!(!team.contains(PersonId::new()));
    }
}
