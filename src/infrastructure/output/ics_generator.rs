//! ICS (RFC 5545) Generator module
//!
//! Stateless struct with a `generate_string` method. Owns line folding
//! (§3.1, 75 octets, CRLF + space continuation) and value escaping so
//! every calendar output goes through one place.

use chrono::{DateTime, Utc};

use crate::domain::entities::{Assignment, Event, EventId};

const FOLD_WIDTH: usize = 75;

/// One VEVENT's worth of data, already resolved from assignments — the
/// generator itself does no lookups, it only formats.
pub struct CalendarEntry {
    pub event_id: EventId,
    pub scope_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub event_type: String,
    pub role: Option<String>,
    pub co_assignees: Vec<String>,
    pub location: Option<String>,
    pub shortage: bool,
}

impl CalendarEntry {
    /// Stable UID per §6: `"<event_id>-<scope_id>@roster"`.
    fn uid(&self) -> String {
        format!("{}-{}@roster", self.event_id, self.scope_id)
    }
}

pub struct IcsGenerator;

impl IcsGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Renders a full calendar document for the given entries, stamped with
    /// `now` as `DTSTAMP` for every VEVENT.
    pub fn generate_string(&self, entries: &[CalendarEntry], now: DateTime<Utc>) -> String {
        let mut lines = Vec::new();
        lines.push("BEGIN:VCALENDAR".to_string());
        lines.push("PRODID:-//Roster//EN".to_string());
        lines.push("VERSION:2.0".to_string());
        lines.push("CALSCALE:GREGORIAN".to_string());
        lines.push("METHOD:PUBLISH".to_string());

        for entry in entries {
            lines.extend(self.vevent(entry, now));
        }

        lines.push("END:VCALENDAR".to_string());

        lines.into_iter().map(|line| fold(&line)).collect::<Vec<_>>().join("\r\n") + "\r\n"
    }

    /// A single retirement placeholder VEVENT returned exactly once when a
    /// revoked token is fetched, per §7's "empty but well-formed calendar
    /// once" behavior.
    pub fn generate_retired_placeholder(&self, now: DateTime<Utc>) -> String {
        let mut lines = Vec::new();
        lines.push("BEGIN:VCALENDAR".to_string());
        lines.push("PRODID:-//Roster//EN".to_string());
        lines.push("VERSION:2.0".to_string());
        lines.push("CALSCALE:GREGORIAN".to_string());
        lines.push("METHOD:PUBLISH".to_string());
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:retired-{}@roster", now.timestamp()));
        lines.push(format!("DTSTAMP:{}", format_instant(now)));
        lines.push(format!("DTSTART:{}", format_instant(now)));
        lines.push(format!("DTEND:{}", format_instant(now)));
        lines.push(format!("SUMMARY:{}", escape("This calendar feed has been retired")));
        lines.push("END:VEVENT".to_string());
        lines.push("END:VCALENDAR".to_string());
        lines.into_iter().map(|line| fold(&line)).collect::<Vec<_>>().join("\r\n") + "\r\n"
    }

    fn vevent(&self, entry: &CalendarEntry, now: DateTime<Utc>) -> Vec<String> {
        let mut lines = vec!["BEGIN:VEVENT".to_string()];
        lines.push(format!("UID:{}", entry.uid()));
        lines.push(format!("DTSTAMP:{}", format_instant(now)));
        lines.push(format!("DTSTART:{}", format_instant(entry.start)));
        lines.push(format!("DTEND:{}", format_instant(entry.end)));

        let shortage_prefix = if entry.shortage { "[SHORTAGE] " } else { "" };
        let role_suffix = entry.role.as_deref().map(|r| format!(" ({r})")).unwrap_or_default();
        lines.push(format!("SUMMARY:{}", escape(&format!("{shortage_prefix}{}{role_suffix}", entry.event_type))));

        let mut description = String::new();
        if let Some(role) = &entry.role {
            description.push_str(&format!("Role: {role}"));
        }
        if !entry.co_assignees.is_empty() {
            if !description.is_empty() {
                description.push_str("; ");
            }
            description.push_str(&format!("Also assigned: {}", entry.co_assignees.join(", ")));
        }
        lines.push(format!("DESCRIPTION:{}", escape(&description)));

        if let Some(location) = &entry.location {
            lines.push(format!("LOCATION:{}", escape(location)));
        }
        if let Some(role) = &entry.role {
            lines.push(format!("X-ROSTER-ROLE:{}", escape(role)));
        }
        if entry.shortage {
            lines.push("X-ROSTER-SHORTAGE:TRUE".to_string());
        }

        lines.push("END:VEVENT".to_string());
        lines
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds `CalendarEntry` rows for a single person's assignments.
pub fn person_entries(person_id_str: &str, assignments: &[(Assignment, Event)]) -> Vec<CalendarEntry> {
    assignments
        .iter()
        .map(|(assignment, event)| CalendarEntry {
            event_id: event.id,
            scope_id: person_id_str.to_string(),
            start: event.start_time,
            end: event.end_time,
            event_type: event.event_type.clone(),
            role: Some(assignment.role.clone()),
            co_assignees: Vec::new(),
            location: None,
            shortage: false,
        })
        .collect()
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
        .replace('\n', "\\n")
}

/// RFC 5545 §3.1 line folding: lines longer than 75 octets are split with a
/// CRLF followed by a single leading space on the continuation.
fn fold(line: &str) -> String {
    let bytes = line.as_bytes();
    if bytes.len() <= FOLD_WIDTH {
        return line.to_string();
    }

    let mut out = String::new();
    let mut start = 0;
    let mut first = true;
    while start < bytes.len() {
        let width = if first { FOLD_WIDTH } else { FOLD_WIDTH - 1 };
        let mut end = (start + width).min(bytes.len());
        while end < bytes.len() && !line.is_char_boundary(end) {
            end -= 1;
        }
        if !first {
            out.push_str("\r\n ");
        }
        out.push_str(&line[start..end]);
        start = end;
        first = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn folds_long_lines_with_crlf_space_continuation() {
        let long = "X".repeat(200);
        let folded = fold(&long);
        assert!(folded.contains("\r\n "));
        for segment in folded.split("\r\n ") {
            assert!(segment.len() <= FOLD_WIDTH);
        }
    }

    #[test]
    fn short_lines_are_not_folded() {
        assert_eq!(fold("SUMMARY:short"), "SUMMARY:short");
    }

    #[test]
    fn uid_is_stable_across_role_changes() {
        let event_id = EventId::new();
        let make_entry = |role: &str| CalendarEntry {
            event_id,
            scope_id: "person-1".to_string(),
            start: Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap(),
            event_type: "service".to_string(),
            role: Some(role.to_string()),
            co_assignees: vec![],
            location: None,
            shortage: false,
        };

        let usher_uid = make_entry("usher").uid();
        let greeter_uid = make_entry("greeter").uid();
        assert_eq!(usher_uid, greeter_uid);
        assert_eq!(usher_uid, format!("{event_id}-person-1@roster"));
    }

    #[test]
    fn escapes_special_characters() {
        assert_eq!(escape("a,b;c\\d\ne"), "a\\,b\\;c\\\\d\\ne");
    }

    #[test]
    fn dtstart_uses_utc_z_suffix() {
        let generator = IcsGenerator::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let entry = CalendarEntry {
            event_id: EventId::new(),
            scope_id: "person-1".to_string(),
            start: Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap(),
            event_type: "service".to_string(),
            role: Some("usher".to_string()),
            co_assignees: vec![],
            location: None,
            shortage: false,
        };
        let ics = generator.generate_string(&[entry], now);
        assert!(ics.contains("DTSTART:20240310T100000Z"));
        assert!(ics.contains("DTEND:20240310T110000Z"));
    }
}
