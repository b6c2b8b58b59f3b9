//! Blackout entity module
//!
//! Blackouts are calendar dates, not instants. They are owned by Person
//! and live independently of Solutions; deleting a Solution never deletes
//! a Blackout.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BlackoutId, PersonId};

/// A date range during which a person is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blackout {
    pub id: BlackoutId,
    pub person_id: PersonId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl Blackout {
    pub fn new(person_id: PersonId, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: BlackoutId::new(),
            person_id,
            start_date,
            end_date,
            reason: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.end_date < self.start_date {
            return Err("blackout end_date must not precede start_date".to_string());
        }
        Ok(())
    }

    /// Inclusive containment test: a blackout starting or ending on the
    /// same local date as an event still blocks it.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let blackout = Blackout::new(PersonId::new(), date(12), date(10));
        assert!(blackout.validate().is_err());
    }

    #[test]
    fn covers_is_inclusive_of_both_boundaries() {
        let blackout = Blackout::new(PersonId::new(), date(10), date(10));
        assert!(blackout.covers(date(10)));
        assert!(!blackout.covers(date(9)));
        assert!(!blackout.covers(date(11)));
    }
}
