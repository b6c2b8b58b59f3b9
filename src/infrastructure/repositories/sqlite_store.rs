//! SQLite-backed repository implementations
//!
//! WAL pragma at open, `execute_batch` schema creation,
//! `unchecked_transaction`/`Transaction` for multi-row writes,
//! `params!`/`query_map` for reads, against the unique-key schema the data
//! model requires.
//! One `SqliteStore` per organization database is not assumed; every row
//! is already org-scoped where the tables need it.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::entities::{
    Assignment, AssignmentId, Blackout, BlackoutId, CalendarToken, Event, EventId, Organization,
    OrgId, Person, PersonId, RoleDemand, Solution, SolutionId, SolutionMetrics, Team, TeamId,
    TokenResolution,
};
use crate::domain::repositories::{
    AssignmentStore, BlackoutRepository, CalendarTokenStore, EventRepository, OrganizationRepository,
    PersonRepository, TeamRepository,
};
use crate::domain::value_objects::{ChangeEvent, ChangeKind, HealthScore};
use crate::domain::{RosterError, RosterResult};

const CHANGE_BUS_CAPACITY: usize = 1024;

/// Opens (or creates) a SQLite database at `path` and applies the schema
/// every repository in this module shares. Each repository struct wraps
/// its own `Connection` guarded by a `Mutex`, since `rusqlite::Connection`
/// is `!Sync`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> RosterResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                timezone TEXT NOT NULL,
                config TEXT NOT NULL,
                known_roles TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS people (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                roles TEXT NOT NULL,
                timezone TEXT,
                language TEXT,
                is_archived INTEGER NOT NULL DEFAULT 0,
                UNIQUE(org_id, email),
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                member_ids TEXT NOT NULL,
                UNIQUE(org_id, name),
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                event_type TEXT NOT NULL,
                role_demand TEXT NOT NULL,
                recurring_series_id TEXT,
                exception_of TEXT,
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS blackouts (
                id TEXT PRIMARY KEY,
                person_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                reason TEXT,
                FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS solutions (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                health_score REAL NOT NULL,
                metrics TEXT NOT NULL,
                supersedes TEXT,
                FOREIGN KEY (org_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS active_solutions (
                org_id TEXT PRIMARY KEY,
                solution_id TEXT NOT NULL,
                FOREIGN KEY (solution_id) REFERENCES solutions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                solution_id TEXT,
                event_id TEXT NOT NULL,
                person_id TEXT NOT NULL,
                role TEXT NOT NULL,
                is_manual INTEGER NOT NULL,
                assigned_at TEXT NOT NULL,
                UNIQUE(event_id, person_id, role),
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE,
                FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE,
                FOREIGN KEY (solution_id) REFERENCES solutions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS calendar_tokens (
                person_id TEXT PRIMARY KEY,
                token_hash TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                retired_hash TEXT,
                retired_consumed INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_assignments_person_event ON assignments(person_id, event_id);
            CREATE INDEX IF NOT EXISTS idx_blackouts_person_start ON blackouts(person_id, start_date);
            CREATE INDEX IF NOT EXISTS idx_events_org_range ON events(org_id, start_time, end_time);
            "#,
        )?;

        let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn event_org_id(conn: &Connection, event_id: EventId) -> RosterResult<OrgId> {
        conn.query_row(
            "SELECT org_id FROM events WHERE id = ?1",
            params![event_id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .ok_or_else(|| RosterError::not_found("event", event_id.to_string()))
        .and_then(|s| parse_id(&s))
    }

    fn emit(&self, kind: ChangeKind, org_id: OrgId, entity_id: impl Into<String>) {
        let _ = self.changes.send(ChangeEvent::new(kind, org_id, entity_id, Utc::now()));
    }
}

fn parse_id<T: std::str::FromStr>(s: &str) -> RosterResult<T> {
    s.parse()
        .map_err(|_| RosterError::Internal(format!("malformed id in storage: {s}")))
}

fn parse_date(s: &str) -> RosterResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| RosterError::Internal(e.to_string()))
}

fn parse_instant(s: &str) -> RosterResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RosterError::Internal(e.to_string()))
}

impl OrganizationRepository for SqliteStore {
    fn create(&self, org: Organization) -> RosterResult<Organization> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO organizations (id, name, timezone, config, known_roles) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                org.id.to_string(),
                org.name,
                org.timezone,
                org.config.to_string(),
                serde_json::to_string(&org.known_roles)?,
            ],
        )?;
        Ok(org)
    }

    fn get(&self, id: OrgId) -> RosterResult<Organization> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT name, timezone, config, known_roles FROM organizations WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?
        .ok_or_else(|| RosterError::org_not_found(id))
        .and_then(|(name, timezone, config, known_roles)| {
            Ok(Organization {
                id,
                name,
                timezone,
                config: serde_json::from_str::<Value>(&config)?,
                known_roles: serde_json::from_str(&known_roles)?,
            })
        })
    }

    fn update(&self, org: Organization) -> RosterResult<Organization> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE organizations SET name = ?2, timezone = ?3, config = ?4, known_roles = ?5 WHERE id = ?1",
            params![
                org.id.to_string(),
                org.name,
                org.timezone,
                org.config.to_string(),
                serde_json::to_string(&org.known_roles)?,
            ],
        )?;
        if rows == 0 {
            return Err(RosterError::org_not_found(org.id));
        }
        Ok(org)
    }

    fn list(&self) -> RosterResult<Vec<Organization>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name, timezone, config, known_roles FROM organizations")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, name, timezone, config, known_roles) = row?;
            out.push(Organization {
                id: parse_id(&id)?,
                name,
                timezone,
                config: serde_json::from_str(&config)?,
                known_roles: serde_json::from_str(&known_roles)?,
            });
        }
        Ok(out)
    }
}

impl PersonRepository for SqliteStore {
    fn create(&self, person: Person) -> RosterResult<Person> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO people (id, org_id, email, name, roles, timezone, language, is_archived) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                person.id.to_string(),
                person.org_id.to_string(),
                person.email,
                person.name,
                serde_json::to_string(&person.roles)?,
                person.timezone,
                person.language,
                person.is_archived as i64,
            ],
        )?;
        Ok(person)
    }

    fn get(&self, id: PersonId) -> RosterResult<Person> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT org_id, email, name, roles, timezone, language, is_archived FROM people WHERE id = ?1",
            params![id.to_string()],
            row_to_person(id),
        )
        .optional()?
        .ok_or_else(|| RosterError::not_found("person", id.to_string()))?
    }

    fn update(&self, person: Person) -> RosterResult<Person> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE people SET email = ?2, name = ?3, roles = ?4, timezone = ?5, language = ?6, is_archived = ?7 WHERE id = ?1",
            params![
                person.id.to_string(),
                person.email,
                person.name,
                serde_json::to_string(&person.roles)?,
                person.timezone,
                person.language,
                person.is_archived as i64,
            ],
        )?;
        if rows == 0 {
            return Err(RosterError::not_found("person", person.id.to_string()));
        }
        Ok(person)
    }

    fn list_by_org(&self, org_id: OrgId) -> RosterResult<Vec<Person>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, email, name, roles, timezone, language, is_archived FROM people WHERE org_id = ?1",
        )?;
        let rows = stmt.query_map(params![org_id.to_string()], |row| {
            let id: String = row.get(0)?;
            Ok((
                id,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, email, name, roles, timezone, language, is_archived) = row?;
            out.push(Person {
                id: parse_id(&id)?,
                org_id,
                email,
                name,
                roles: serde_json::from_str(&roles)?,
                timezone,
                language,
                is_archived: is_archived != 0,
            });
        }
        Ok(out)
    }
}

fn row_to_person(id: PersonId) -> impl Fn(&rusqlite::Row) -> rusqlite::Result<RosterResult<Person>> {
    move |row| {
        let org_id: String = row.get(0)?;
        let email: String = row.get(1)?;
        let name: String = row.get(2)?;
        let roles: String = row.get(3)?;
        let timezone: Option<String> = row.get(4)?;
        let language: Option<String> = row.get(5)?;
        let is_archived: i64 = row.get(6)?;
        Ok((|| -> RosterResult<Person> {
            Ok(Person {
                id,
                org_id: parse_id(&org_id)?,
                email,
                name,
                roles: serde_json::from_str(&roles)?,
                timezone,
                language,
                is_archived: is_archived != 0,
            })
        })())
    }
}

impl TeamRepository for SqliteStore {
    fn create(&self, team: Team) -> RosterResult<Team> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO teams (id, org_id, name, member_ids) VALUES (?1, ?2, ?3, ?4)",
            params![
                team.id.to_string(),
                team.org_id.to_string(),
                team.name,
                serde_json::to_string(&team.member_ids)?,
            ],
        )?;
        Ok(team)
    }

    fn get(&self, id: TeamId) -> RosterResult<Team> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT org_id, name, member_ids FROM teams WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| RosterError::not_found("team", id.to_string()))?;
        Ok(Team {
            id,
            org_id: parse_id(&row.0)?,
            name: row.1,
            member_ids: serde_json::from_str(&row.2)?,
        })
    }

    fn update(&self, team: Team) -> RosterResult<Team> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE teams SET name = ?2, member_ids = ?3 WHERE id = ?1",
            params![team.id.to_string(), team.name, serde_json::to_string(&team.member_ids)?],
        )?;
        if rows == 0 {
            return Err(RosterError::not_found("team", team.id.to_string()));
        }
        Ok(team)
    }

    fn list_by_org(&self, org_id: OrgId) -> RosterResult<Vec<Team>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name, member_ids FROM teams WHERE org_id = ?1")?;
        let rows = stmt.query_map(params![org_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, name, member_ids) = row?;
            out.push(Team {
                id: parse_id(&id)?,
                org_id,
                name,
                member_ids: serde_json::from_str(&member_ids)?,
            });
        }
        Ok(out)
    }
}

impl EventRepository for SqliteStore {
    fn create(&self, event: Event) -> RosterResult<Event> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (id, org_id, start_time, end_time, event_type, role_demand, recurring_series_id, exception_of) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id.to_string(),
                event.org_id.to_string(),
                event.start_time.to_rfc3339(),
                event.end_time.to_rfc3339(),
                event.event_type,
                serde_json::to_string(&event.role_demand)?,
                event.recurring_series_id,
                event.exception_of.map(|id| id.to_string()),
            ],
        )?;
        Ok(event)
    }

    fn get(&self, id: EventId) -> RosterResult<Event> {
        let conn = self.conn.lock().unwrap();
        row_to_event(&conn, id)
    }

    fn update(&self, event: Event) -> RosterResult<Event> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE events SET start_time = ?2, end_time = ?3, event_type = ?4, role_demand = ?5, recurring_series_id = ?6, exception_of = ?7 WHERE id = ?1",
            params![
                event.id.to_string(),
                event.start_time.to_rfc3339(),
                event.end_time.to_rfc3339(),
                event.event_type,
                serde_json::to_string(&event.role_demand)?,
                event.recurring_series_id,
                event.exception_of.map(|id| id.to_string()),
            ],
        )?;
        if rows == 0 {
            return Err(RosterError::not_found("event", event.id.to_string()));
        }
        Ok(event)
    }

    fn list_in_range(&self, org_id: OrgId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM events WHERE org_id = ?1 AND start_time < ?2 AND end_time > ?3",
        )?;
        let ids = stmt.query_map(
            params![org_id.to_string(), to.to_rfc3339(), from.to_rfc3339()],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for id in ids {
            let id: EventId = parse_id(&id?)?;
            out.push(row_to_event(&conn, id)?);
        }
        Ok(out)
    }
}

fn row_to_event(conn: &Connection, id: EventId) -> RosterResult<Event> {
    conn.query_row(
        "SELECT org_id, start_time, end_time, event_type, role_demand, recurring_series_id, exception_of FROM events WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        },
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("event", id.to_string()))
    .and_then(|(org_id, start_time, end_time, event_type, role_demand, series, exception_of)| {
        Ok(Event {
            id,
            org_id: parse_id(&org_id)?,
            start_time: parse_instant(&start_time)?,
            end_time: parse_instant(&end_time)?,
            event_type,
            role_demand: serde_json::from_str::<RoleDemand>(&role_demand)?,
            recurring_series_id: series,
            exception_of: exception_of.map(|s| parse_id(&s)).transpose()?,
        })
    })
}

impl BlackoutRepository for SqliteStore {
    fn create(&self, blackout: Blackout) -> RosterResult<Blackout> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO blackouts (id, person_id, start_date, end_date, reason) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                blackout.id.to_string(),
                blackout.person_id.to_string(),
                blackout.start_date.to_string(),
                blackout.end_date.to_string(),
                blackout.reason,
            ],
        )?;
        Ok(blackout)
    }

    fn delete(&self, id: BlackoutId) -> RosterResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM blackouts WHERE id = ?1", params![id.to_string()])?;
        if rows == 0 {
            return Err(RosterError::not_found("blackout", id.to_string()));
        }
        Ok(())
    }

    fn list_by_person(&self, person_id: PersonId) -> RosterResult<Vec<Blackout>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, start_date, end_date, reason FROM blackouts WHERE person_id = ?1",
        )?;
        let rows = stmt.query_map(params![person_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, start, end, reason) = row?;
            out.push(Blackout {
                id: parse_id(&id)?,
                person_id,
                start_date: parse_date(&start)?,
                end_date: parse_date(&end)?,
                reason,
            });
        }
        Ok(out)
    }

    fn list_covering(&self, person_id: PersonId, date: NaiveDate) -> RosterResult<Vec<Blackout>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, start_date, end_date, reason FROM blackouts WHERE person_id = ?1 AND start_date <= ?2 AND end_date >= ?2",
        )?;
        let date_str = date.to_string();
        let rows = stmt.query_map(params![person_id.to_string(), date_str], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, start, end, reason) = row?;
            out.push(Blackout {
                id: parse_id(&id)?,
                person_id,
                start_date: parse_date(&start)?,
                end_date: parse_date(&end)?,
                reason,
            });
        }
        Ok(out)
    }
}

impl AssignmentStore for SqliteStore {
    fn bulk_write(&self, solution: Solution, assignments: Vec<Assignment>) -> RosterResult<Solution> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO solutions (id, org_id, created_at, health_score, metrics, supersedes) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                solution.id.to_string(),
                solution.org_id.to_string(),
                solution.created_at.to_rfc3339(),
                solution.health_score.value(),
                serde_json::to_string(&solution.metrics)?,
                solution.supersedes.map(|id| id.to_string()),
            ],
        )?;

        let prior: Option<String> = tx
            .query_row(
                "SELECT solution_id FROM active_solutions WHERE org_id = ?1",
                params![solution.org_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(prior_id) = &prior {
            tx.execute(
                "DELETE FROM assignments WHERE solution_id = ?1",
                params![prior_id],
            )?;
        }
        tx.execute(
            "INSERT INTO active_solutions (org_id, solution_id) VALUES (?1, ?2) ON CONFLICT(org_id) DO UPDATE SET solution_id = excluded.solution_id",
            params![solution.org_id.to_string(), solution.id.to_string()],
        )?;

        for assignment in &assignments {
            tx.execute(
                "INSERT INTO assignments (id, solution_id, event_id, person_id, role, is_manual, assigned_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    assignment.id.to_string(),
                    assignment.solution_id.map(|id| id.to_string()),
                    assignment.event_id.to_string(),
                    assignment.person_id.to_string(),
                    assignment.role,
                    assignment.is_manual as i64,
                    assignment.assigned_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        drop(conn);
        self.emit(ChangeKind::SolutionPublished, solution.org_id, solution.id.to_string());
        Ok(solution)
    }

    fn active_solution(&self, org_id: OrgId) -> RosterResult<Option<Solution>> {
        let conn = self.conn.lock().unwrap();
        let solution_id: Option<String> = conn
            .query_row(
                "SELECT solution_id FROM active_solutions WHERE org_id = ?1",
                params![org_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match solution_id {
            Some(id) => Ok(Some(row_to_solution(&conn, parse_id(&id)?)?)),
            None => Ok(None),
        }
    }

    fn get_solution(&self, id: SolutionId) -> RosterResult<Solution> {
        let conn = self.conn.lock().unwrap();
        row_to_solution(&conn, id)
    }

    fn assign(&self, assignment: Assignment) -> RosterResult<Assignment> {
        let conn = self.conn.lock().unwrap();
        let existing = conn
            .query_row(
                "SELECT id FROM assignments WHERE event_id = ?1 AND person_id = ?2 AND role = ?3",
                params![
                    assignment.event_id.to_string(),
                    assignment.person_id.to_string(),
                    assignment.role,
                ],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(RosterError::Conflict {
                event_id: assignment.event_id,
                person_id: assignment.person_id,
                role: assignment.role.clone(),
            });
        }
        conn.execute(
            "INSERT INTO assignments (id, solution_id, event_id, person_id, role, is_manual, assigned_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                assignment.id.to_string(),
                assignment.solution_id.map(|id| id.to_string()),
                assignment.event_id.to_string(),
                assignment.person_id.to_string(),
                assignment.role,
                assignment.is_manual as i64,
                assignment.assigned_at.to_rfc3339(),
            ],
        )?;
        let org_id = Self::event_org_id(&conn, assignment.event_id)?;
        drop(conn);
        self.emit(ChangeKind::AssignmentCreated, org_id, assignment.id.to_string());
        Ok(assignment)
    }

    fn unassign(&self, id: AssignmentId) -> RosterResult<()> {
        let conn = self.conn.lock().unwrap();
        let event_id: Option<String> = conn
            .query_row(
                "SELECT event_id FROM assignments WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let event_id: EventId = match event_id {
            Some(s) => parse_id(&s)?,
            None => return Err(RosterError::assignment_not_found(id)),
        };
        conn.execute("DELETE FROM assignments WHERE id = ?1", params![id.to_string()])?;
        let org_id = Self::event_org_id(&conn, event_id)?;
        drop(conn);
        self.emit(ChangeKind::AssignmentRemoved, org_id, id.to_string());
        Ok(())
    }

    fn get_assignment(&self, id: AssignmentId) -> RosterResult<Assignment> {
        let conn = self.conn.lock().unwrap();
        row_to_assignment(&conn, id)
    }

    fn swap(
        &self,
        unassign_a: AssignmentId,
        unassign_b: AssignmentId,
        new_a: Assignment,
        new_b: Assignment,
    ) -> RosterResult<(Assignment, Assignment)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for id in [unassign_a, unassign_b] {
            let exists: Option<String> = tx
                .query_row(
                    "SELECT id FROM assignments WHERE id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(RosterError::assignment_not_found(id));
            }
        }

        for assignment in [&new_a, &new_b] {
            let clash: Option<String> = tx
                .query_row(
                    "SELECT id FROM assignments WHERE event_id = ?1 AND person_id = ?2 AND role = ?3 AND id NOT IN (?4, ?5)",
                    params![
                        assignment.event_id.to_string(),
                        assignment.person_id.to_string(),
                        assignment.role,
                        unassign_a.to_string(),
                        unassign_b.to_string(),
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            if clash.is_some() {
                return Err(RosterError::Conflict {
                    event_id: assignment.event_id,
                    person_id: assignment.person_id,
                    role: assignment.role.clone(),
                });
            }
        }

        tx.execute("DELETE FROM assignments WHERE id = ?1", params![unassign_a.to_string()])?;
        tx.execute("DELETE FROM assignments WHERE id = ?1", params![unassign_b.to_string()])?;
        for assignment in [&new_a, &new_b] {
            tx.execute(
                "INSERT INTO assignments (id, solution_id, event_id, person_id, role, is_manual, assigned_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    assignment.id.to_string(),
                    assignment.solution_id.map(|id| id.to_string()),
                    assignment.event_id.to_string(),
                    assignment.person_id.to_string(),
                    assignment.role,
                    assignment.is_manual as i64,
                    assignment.assigned_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;

        let org_a = Self::event_org_id(&conn, new_a.event_id)?;
        let org_b = Self::event_org_id(&conn, new_b.event_id)?;
        drop(conn);
        self.emit(ChangeKind::AssignmentCreated, org_a, new_a.id.to_string());
        self.emit(ChangeKind::AssignmentCreated, org_b, new_b.id.to_string());
        Ok((new_a, new_b))
    }

    fn list_for_event(&self, event_id: EventId) -> RosterResult<Vec<Assignment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM assignments WHERE event_id = ?1")?;
        let ids = stmt.query_map(params![event_id.to_string()], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for id in ids {
            out.push(row_to_assignment(&conn, parse_id(&id?)?)?);
        }
        Ok(out)
    }

    fn list_for_person(&self, person_id: PersonId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Assignment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM assignments WHERE person_id = ?1 AND assigned_at >= ?2 AND assigned_at <= ?3",
        )?;
        let ids = stmt.query_map(
            params![person_id.to_string(), from.to_rfc3339(), to.to_rfc3339()],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for id in ids {
            out.push(row_to_assignment(&conn, parse_id(&id?)?)?);
        }
        Ok(out)
    }

    fn list_for_org(&self, org_id: OrgId, from: DateTime<Utc>, to: DateTime<Utc>) -> RosterResult<Vec<Assignment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.id FROM assignments a JOIN events e ON e.id = a.event_id \
             WHERE e.org_id = ?1 AND a.assigned_at >= ?2 AND a.assigned_at <= ?3",
        )?;
        let ids = stmt.query_map(
            params![org_id.to_string(), from.to_rfc3339(), to.to_rfc3339()],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for id in ids {
            out.push(row_to_assignment(&conn, parse_id(&id?)?)?);
        }
        Ok(out)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

fn row_to_assignment(conn: &Connection, id: AssignmentId) -> RosterResult<Assignment> {
    conn.query_row(
        "SELECT solution_id, event_id, person_id, role, is_manual, assigned_at FROM assignments WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    )
    .optional()?
    .ok_or_else(|| RosterError::assignment_not_found(id))
    .and_then(|(solution_id, event_id, person_id, role, is_manual, assigned_at)| {
        Ok(Assignment {
            id,
            solution_id: solution_id.map(|s| parse_id(&s)).transpose()?,
            event_id: parse_id(&event_id)?,
            person_id: parse_id(&person_id)?,
            role,
            is_manual: is_manual != 0,
            assigned_at: parse_instant(&assigned_at)?,
        })
    })
}

fn row_to_solution(conn: &Connection, id: SolutionId) -> RosterResult<Solution> {
    conn.query_row(
        "SELECT org_id, created_at, health_score, metrics, supersedes FROM solutions WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        },
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("solution", id.to_string()))
    .and_then(|(org_id, created_at, health_score, metrics, supersedes)| {
        Ok(Solution {
            id,
            org_id: parse_id(&org_id)?,
            created_at: parse_instant(&created_at)?,
            health_score: HealthScore::new(health_score),
            metrics: serde_json::from_str::<SolutionMetrics>(&metrics)?,
            supersedes: supersedes.map(|s| parse_id(&s)).transpose()?,
        })
    })
}

impl CalendarTokenStore for SqliteStore {
    fn issue(&self, person_id: PersonId, at: DateTime<Utc>) -> RosterResult<String> {
        let (entity, plaintext) = CalendarToken::issue(person_id, at);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO calendar_tokens (person_id, token_hash, created_at, retired_hash, retired_consumed) VALUES (?1, ?2, ?3, NULL, 0) \
             ON CONFLICT(person_id) DO UPDATE SET token_hash = excluded.token_hash, created_at = excluded.created_at, retired_hash = NULL, retired_consumed = 0",
            params![person_id.to_string(), entity.token_hash, entity.created_at.to_rfc3339()],
        )?;
        Ok(plaintext)
    }

    fn rotate(&self, person_id: PersonId, at: DateTime<Utc>) -> RosterResult<String> {
        let (entity, plaintext) = CalendarToken::issue(person_id, at);
        let conn = self.conn.lock().unwrap();
        let prior_hash: Option<String> = conn
            .query_row(
                "SELECT token_hash FROM calendar_tokens WHERE person_id = ?1",
                params![person_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        conn.execute(
            "INSERT INTO calendar_tokens (person_id, token_hash, created_at, retired_hash, retired_consumed) VALUES (?1, ?2, ?3, ?4, 0) \
             ON CONFLICT(person_id) DO UPDATE SET token_hash = excluded.token_hash, created_at = excluded.created_at, retired_hash = excluded.retired_hash, retired_consumed = 0",
            params![person_id.to_string(), entity.token_hash, entity.created_at.to_rfc3339(), prior_hash],
        )?;
        Ok(plaintext)
    }

    fn resolve(&self, plaintext: &str) -> RosterResult<TokenResolution> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT person_id, token_hash, retired_hash, retired_consumed FROM calendar_tokens")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        for (person_id_str, token_hash, _, _) in &rows {
            if CalendarToken::hash_matches(token_hash, plaintext) {
                return Ok(TokenResolution::Active(parse_id(person_id_str)?));
            }
        }
        for (person_id_str, _, retired_hash, retired_consumed) in &rows {
            if *retired_consumed != 0 {
                continue;
            }
            if let Some(retired_hash) = retired_hash {
                if CalendarToken::hash_matches(retired_hash, plaintext) {
                    let person_id: PersonId = parse_id(person_id_str)?;
                    conn.execute(
                        "UPDATE calendar_tokens SET retired_consumed = 1 WHERE person_id = ?1",
                        params![person_id_str],
                    )?;
                    return Ok(TokenResolution::Retired(person_id));
                }
            }
        }
        Err(RosterError::not_found("calendar_token", "<redacted>"))
    }

    fn get(&self, person_id: PersonId) -> RosterResult<CalendarToken> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT token_hash, created_at FROM calendar_tokens WHERE person_id = ?1",
            params![person_id.to_string()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?
        .ok_or_else(|| RosterError::not_found("calendar_token", person_id.to_string()))
        .and_then(|(token_hash, created_at)| {
            Ok(CalendarToken {
                person_id,
                token_hash,
                created_at: parse_instant(&created_at)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::OrgId;

    fn store() -> SqliteStore {
        SqliteStore::open(":memory:").unwrap()
    }

    fn seed_org(store: &SqliteStore) -> OrgId {
        let org = Organization::new("Acme", "America/New_York");
        let id = org.id;
        store.create(org).unwrap();
        id
    }

    #[test]
    fn person_round_trips_through_sqlite() {
        let store = store();
        let org_id = seed_org(&store);
        let person = Person::new(org_id, "a@b.com", "Alice").with_role("usher");
        let id = person.id;
        store.create(person).unwrap();
        let fetched = PersonRepository::get(&store, id).unwrap();
        assert_eq!(fetched.email, "a@b.com");
        assert!(fetched.roles.contains("usher"));
    }

    #[test]
    fn duplicate_assignment_key_is_conflict() {
        let store = store();
        let org_id = seed_org(&store);
        let event = Event::new(org_id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1));
        let event_id = event.id;
        EventRepository::create(&store, event).unwrap();
        let person_id = PersonId::new();
        let a1 = Assignment::new_manual(event_id, person_id, "usher".into(), Utc::now());
        let a2 = Assignment::new_manual(event_id, person_id, "usher".into(), Utc::now());
        store.assign(a1).unwrap();
        assert!(matches!(store.assign(a2), Err(RosterError::Conflict { .. })));
    }

    #[test]
    fn calendar_token_rotation_retires_prior_plaintext_for_one_fetch() {
        let store = store();
        let person_id = PersonId::new();
        let first = store.issue(person_id, Utc::now()).unwrap();
        let second = store.rotate(person_id, Utc::now()).unwrap();

        assert_eq!(store.resolve(&second).unwrap(), TokenResolution::Active(person_id));
        assert_eq!(store.resolve(&first).unwrap(), TokenResolution::Retired(person_id));
        assert!(store.resolve(&first).is_err());
    }

    #[test]
    fn swap_replaces_both_assignments_in_one_transaction() {
        let store = store();
        let org_id = seed_org(&store);
        let event_a = Event::new(org_id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1));
        let event_b = Event::new(org_id, "service", Utc::now(), Utc::now() + chrono::Duration::hours(1));
        let (event_a_id, event_b_id) = (event_a.id, event_b.id);
        EventRepository::create(&store, event_a).unwrap();
        EventRepository::create(&store, event_b).unwrap();

        let person_a = PersonId::new();
        let person_b = PersonId::new();
        let a = Assignment::new_manual(event_a_id, person_a, "usher".into(), Utc::now());
        let b = Assignment::new_manual(event_b_id, person_b, "greeter".into(), Utc::now());
        let (id_a, id_b) = (a.id, b.id);
        store.assign(a).unwrap();
        store.assign(b).unwrap();

        let new_a = Assignment::new_manual(event_a_id, person_b, "usher".into(), Utc::now());
        let new_b = Assignment::new_manual(event_b_id, person_a, "greeter".into(), Utc::now());
        let (committed_a, committed_b) = store.swap(id_a, id_b, new_a, new_b).unwrap();

        assert!(store.get_assignment(id_a).is_err());
        assert!(store.get_assignment(id_b).is_err());
        assert_eq!(store.get_assignment(committed_a.id).unwrap().person_id, person_b);
        assert_eq!(store.get_assignment(committed_b.id).unwrap().person_id, person_a);
    }
}
