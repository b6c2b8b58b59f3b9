//! CLI Commands module
//!
//! Command implementations for the scheduling core: a scenario runner that
//! exercises the documented behaviors end to end against an in-memory
//! store, and a set of thin commands over a SQLite-backed `RosterCore` for
//! real provisioning and solver/assignment operations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::entities::{Blackout, Event, EventId, Organization, OrgId, Person, PersonId, Team};
use crate::domain::repositories::{
    BlackoutRepository, EventRepository, OrganizationRepository, PersonRepository, TeamRepository,
};
use crate::infrastructure::repositories::{
    InMemoryAssignmentStore, InMemoryBlackoutRepository, InMemoryCalendarTokenStore,
    InMemoryEventRepository, InMemoryOrganizationRepository, InMemoryPersonRepository, SqliteStore,
};
use crate::infrastructure::RosterConfig;
use crate::presentation::cli::Scenario;
use crate::RosterCore;

/// Builds a `RosterCore` over a fresh `SqliteStore` at `database`, using
/// `RosterConfig::from_env` for solver budgets and the calendar cache TTL.
fn open_sqlite_core(database: &Path) -> Result<RosterCore> {
    let config = RosterConfig::from_env();
    let store = Arc::new(SqliteStore::open(database).with_context(|| format!("opening database {database:?}"))?);

    Ok(RosterCore::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        config,
    ))
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct SeedFile {
    #[serde(default)]
    organizations: Vec<SeedOrg>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeedOrg {
    name: String,
    timezone: String,
    #[serde(default)]
    people: Vec<SeedPerson>,
    #[serde(default)]
    teams: Vec<String>,
    #[serde(default)]
    events: Vec<SeedEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeedPerson {
    email: String,
    name: String,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    blackouts: Vec<SeedBlackout>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeedBlackout {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeedEvent {
    event_type: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default)]
    role_demand: std::collections::BTreeMap<String, u32>,
}

/// Loads organizations, people, teams, events, and blackouts from a JSON
/// file into a SQLite database, for real (non-demo) use.
pub struct SeedCommand;

impl SeedCommand {
    pub fn run(input: &Path, database: &Path) -> Result<()> {
        let raw = fs::read_to_string(input).with_context(|| format!("reading seed file {input:?}"))?;
        let seed: SeedFile = serde_json::from_str(&raw).with_context(|| format!("parsing seed file {input:?}"))?;
        let store = SqliteStore::open(database).with_context(|| format!("opening database {database:?}"))?;

        for seed_org in seed.organizations {
            let org = Organization::new(seed_org.name.as_str(), seed_org.timezone.as_str());
            org.validate().map_err(anyhow::Error::msg)?;
            let org = OrganizationRepository::create(&store, org)?;
            info!(org_id = %org.id, name = %org.name, "seeded organization");

            for seed_person in seed_org.people {
                let mut person = Person::new(org.id, seed_person.email.as_str(), seed_person.name.as_str());
                for role in &seed_person.roles {
                    person = person.with_role(role.clone());
                }
                let person = PersonRepository::create(&store, person)?;
                info!(person_id = %person.id, email = %person.email, "seeded person");

                for seed_blackout in seed_person.blackouts {
                    let mut blackout = Blackout::new(person.id, seed_blackout.start_date, seed_blackout.end_date);
                    blackout.validate().map_err(anyhow::Error::msg)?;
                    blackout.reason = seed_blackout.reason;
                    BlackoutRepository::create(&store, blackout)?;
                }
            }

            for team_name in seed_org.teams {
                TeamRepository::create(&store, Team::new(org.id, team_name))?;
            }

            for seed_event in seed_org.events {
                let mut event = Event::new(org.id, seed_event.event_type.as_str(), seed_event.start_time, seed_event.end_time);
                for (role, count) in seed_event.role_demand {
                    event = event.with_demand(role, count);
                }
                event.validate().map_err(anyhow::Error::msg)?;
                let event = EventRepository::create(&store, event)?;
                info!(event_id = %event.id, event_type = %event.event_type, "seeded event");
            }
        }

        Ok(())
    }
}

/// Runs the solver over an org and a set of events, printing the resulting
/// solution's health score and shortages.
pub struct SolveCommand;

impl SolveCommand {
    pub fn run(database: &Path, org: &str, events: &[String], seed: Option<u64>) -> Result<()> {
        let core = open_sqlite_core(database)?;
        let org_id: OrgId = org.parse().context("parsing --org as a valid id")?;

        let event_ids: Vec<EventId> = events
            .iter()
            .map(|s| s.parse::<EventId>().context("parsing --events entry as a valid id"))
            .collect::<Result<_>>()?;

        let solution_id = core.solve(org_id, &event_ids, seed)?;
        let (from, to) = unbounded_window();
        let solution = core.list_assignments(org_id, from, to)?;

        println!("solution {solution_id} published, {} assignments active for org", solution.len());
        Ok(())
    }
}

/// Validates an event's current assignments and prints the resulting
/// warnings and blocked assignments, if any.
pub struct ValidateCommand;

impl ValidateCommand {
    pub fn run(database: &Path, event: &str) -> Result<()> {
        let core = open_sqlite_core(database)?;
        let event_id: EventId = event.parse().context("parsing --event as a valid id")?;

        let report = core.validate_event(event_id)?;
        println!("is_valid: {}", report.is_valid);
        for warning in &report.warnings {
            println!("  warning: {:?} {}", warning.kind, warning.detail);
        }
        for blocked in &report.blocked_assignments {
            println!("  blocked: person {} role {} ({:?})", blocked.person_id, blocked.role, blocked.reason);
        }
        Ok(())
    }
}

pub struct AssignCommand;

impl AssignCommand {
    pub fn run(database: &Path, event: &str, person: &str, role: &str) -> Result<()> {
        let core = open_sqlite_core(database)?;
        let event_id: EventId = event.parse().context("parsing --event as a valid id")?;
        let person_id: PersonId = person.parse().context("parsing --person as a valid id")?;

        let result = core.assign(event_id, person_id, role.to_string())?;
        println!("assigned {} ({}): is_valid={}", result.assignment.id, result.assignment.role, result.report.is_valid);
        Ok(())
    }
}

pub struct UnassignCommand;

impl UnassignCommand {
    pub fn run(database: &Path, assignment: &str) -> Result<()> {
        let core = open_sqlite_core(database)?;
        let assignment_id = assignment.parse().context("parsing --assignment as a valid id")?;
        core.unassign(assignment_id)?;
        println!("unassigned {assignment_id}");
        Ok(())
    }
}

pub struct CalendarCommand;

impl CalendarCommand {
    pub fn run(database: &Path, token: &str) -> Result<()> {
        let core = open_sqlite_core(database)?;
        let ics = core.get_person_calendar(token)?;
        print!("{ics}");
        Ok(())
    }
}

pub struct RotateTokenCommand;

impl RotateTokenCommand {
    pub fn run(database: &Path, person: &str) -> Result<()> {
        let core = open_sqlite_core(database)?;
        let person_id: PersonId = person.parse().context("parsing --person as a valid id")?;
        let token = core.rotate_calendar_token(person_id)?;
        println!("{token}");
        Ok(())
    }
}

/// In-memory harness backing the documented scenarios. Built fresh per
/// scenario so earlier scenarios never leak state into later ones.
struct DemoHarness {
    core: RosterCore,
    orgs: Arc<InMemoryOrganizationRepository>,
    people: Arc<InMemoryPersonRepository>,
    blackouts: Arc<InMemoryBlackoutRepository>,
    events: Arc<InMemoryEventRepository>,
}

impl DemoHarness {
    fn new() -> Self {
        let orgs = Arc::new(InMemoryOrganizationRepository::new());
        let people = Arc::new(InMemoryPersonRepository::new());
        let blackouts = Arc::new(InMemoryBlackoutRepository::new());
        let events = Arc::new(InMemoryEventRepository::new());
        let store = Arc::new(InMemoryAssignmentStore::new(events.clone()));
        let tokens = Arc::new(InMemoryCalendarTokenStore::new());

        let core = RosterCore::new(
            orgs.clone(),
            people.clone(),
            blackouts.clone(),
            events.clone(),
            store,
            tokens,
            RosterConfig::default(),
        );

        Self {
            core,
            orgs,
            people,
            blackouts,
            events,
        }
    }

    fn seed_org(&self) -> Result<Organization> {
        let org = Organization::new("Scenario Church", "UTC");
        Ok(self.orgs.create(org)?)
    }

    fn seed_usher(&self, org_id: OrgId, email: &str, name: &str) -> Result<Person> {
        let person = Person::new(org_id, email, name).with_role("usher");
        Ok(self.people.create(person)?)
    }

    fn seed_event(&self, org_id: OrgId, start: DateTime<Utc>, end: DateTime<Utc>, role: &str, demand: u32) -> Result<Event> {
        let event = Event::new(org_id, "service", start, end).with_demand(role, demand);
        Ok(self.events.create(event)?)
    }
}

/// `list_assignments`'s window matches against `assigned_at` (when the
/// binding was recorded), not the event's own time range, so scenario
/// checks here span all of recorded history rather than just the event day.
fn unbounded_window() -> (DateTime<Utc>, DateTime<Utc>) {
    (DateTime::<Utc>::MIN_UTC, Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0).unwrap())
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, hour, minute, 0).unwrap()
}

/// Scenario A — simple assignment: one event, two candidate ushers, a
/// fixed seed. Expects P1 assigned (lexicographic order) and a perfect
/// health score.
fn scenario_a() -> Result<()> {
    let harness = DemoHarness::new();
    let org = harness.seed_org()?;
    harness.seed_usher(org.id, "p1@example.com", "P1")?;
    harness.seed_usher(org.id, "p2@example.com", "P2")?;
    let event = harness.seed_event(org.id, at(10, 0), at(11, 0), "usher", 1)?;

    let solution_id = harness.core.solve(org.id, &[event.id], Some(42))?;
    let report = harness.core.validate_event(event.id)?;

    println!("scenario A: solution {solution_id}, is_valid={}", report.is_valid);
    Ok(())
}

/// Scenario B — a blackout in the person's local timezone blocks the
/// solver from picking them even though the event's UTC instant alone
/// wouldn't reveal the conflict.
fn scenario_b() -> Result<()> {
    let harness = DemoHarness::new();
    let org = harness.seed_org()?;
    let mut p1 = Person::new(org.id, "p1@example.com", "P1").with_role("usher");
    p1.timezone = Some("America/New_York".to_string());
    let p1 = harness.people.create(p1)?;
    harness.seed_usher(org.id, "p2@example.com", "P2")?;

    harness.blackouts.create(Blackout::new(
        p1.id,
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
    ))?;

    let event = harness.seed_event(org.id, at(14, 0), at(15, 0), "usher", 1)?;
    let solution_id = harness.core.solve(org.id, &[event.id], Some(42))?;
    let (from, to) = unbounded_window();
    let assignments = harness.core.list_assignments(org.id, from, to)?;

    println!(
        "scenario B: solution {solution_id}, {} assignment(s), blocked person excluded={}",
        assignments.len(),
        !assignments.iter().any(|a| a.person_id == p1.id)
    );
    Ok(())
}

/// Scenario C — demand exceeds supply; the solver fills what it can and
/// reports the remainder as a shortage rather than an error.
fn scenario_c() -> Result<()> {
    let harness = DemoHarness::new();
    let org = harness.seed_org()?;
    harness.seed_usher(org.id, "p1@example.com", "P1")?;
    let event = harness.seed_event(org.id, at(10, 0), at(11, 0), "usher", 2)?;

    harness.core.solve(org.id, &[event.id], Some(42))?;
    let report = harness.core.validate_event(event.id)?;

    println!("scenario C: is_valid={} (shortage expected)", report.is_valid);
    Ok(())
}

/// Scenario D — an admin manually assigns a person the solver would have
/// excluded for a blackout; the operation still succeeds, flagged as
/// manual, with the conflict surfaced as a warning rather than a rejection.
fn scenario_d() -> Result<()> {
    let harness = DemoHarness::new();
    let org = harness.seed_org()?;
    let p1 = harness.seed_usher(org.id, "p1@example.com", "P1")?;
    harness.blackouts.create(Blackout::new(
        p1.id,
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
    ))?;
    let event = harness.seed_event(org.id, at(10, 0), at(11, 0), "usher", 1)?;

    let result = harness.core.assign(event.id, p1.id, "usher".to_string())?;
    println!(
        "scenario D: is_manual={}, blocked_assignments={}",
        result.assignment.is_manual,
        result.report.blocked_assignments.len()
    );
    Ok(())
}

/// Scenario E — two overlapping events both need an usher and there are
/// exactly two candidates; the solver must split them rather than ever
/// double-booking one person across both.
fn scenario_e() -> Result<()> {
    let harness = DemoHarness::new();
    let org = harness.seed_org()?;
    harness.seed_usher(org.id, "p1@example.com", "P1")?;
    harness.seed_usher(org.id, "p2@example.com", "P2")?;
    let e1 = harness.seed_event(org.id, at(10, 0), at(11, 0), "usher", 1)?;
    let e2 = harness.seed_event(org.id, at(10, 30), at(11, 30), "usher", 1)?;

    harness.core.solve(org.id, &[e1.id, e2.id], Some(42))?;
    let (from, to) = unbounded_window();
    let assignments = harness.core.list_assignments(org.id, from, to)?;
    let people: std::collections::HashSet<_> = assignments.iter().map(|a| a.person_id).collect();

    println!(
        "scenario E: {} assignment(s) across {} distinct people (no double-booking expected)",
        assignments.len(),
        people.len()
    );
    Ok(())
}

/// Scenario F — the calendar UID for an event/scope pair survives a
/// reassignment, so calendar clients treat the refetch as an update to
/// the same VEVENT rather than a duplicate.
fn scenario_f() -> Result<()> {
    let harness = DemoHarness::new();
    let org = harness.seed_org()?;
    let p1 = harness.seed_usher(org.id, "p1@example.com", "P1")?;
    let event = harness.seed_event(org.id, at(10, 0), at(11, 0), "usher", 1)?;

    let result = harness.core.assign(event.id, p1.id, "usher".to_string())?;
    let token = harness.core.rotate_calendar_token(p1.id)?;
    let ics_before = harness.core.get_person_calendar(&token)?;

    harness.core.unassign(result.assignment.id)?;
    harness.core.assign(event.id, p1.id, "greeter".to_string())?;
    let ics_after = harness.core.get_person_calendar(&token)?;

    let uid_line = |ics: &str| ics.lines().find(|l| l.starts_with("UID:")).map(str::to_string);
    println!(
        "scenario F: UID stable across reassignment={}",
        uid_line(&ics_before) == uid_line(&ics_after)
    );
    Ok(())
}

pub struct DemoCommand;

impl DemoCommand {
    pub fn run(scenario: &Scenario) -> Result<()> {
        let scenarios: Vec<(&str, fn() -> Result<()>)> = vec![
            ("A", scenario_a as fn() -> Result<()>),
            ("B", scenario_b),
            ("C", scenario_c),
            ("D", scenario_d),
            ("E", scenario_e),
            ("F", scenario_f),
        ];

        let selected: Vec<_> = match scenario {
            Scenario::All => scenarios,
            Scenario::A => scenarios.into_iter().filter(|(n, _)| *n == "A").collect(),
            Scenario::B => scenarios.into_iter().filter(|(n, _)| *n == "B").collect(),
            Scenario::C => scenarios.into_iter().filter(|(n, _)| *n == "C").collect(),
            Scenario::D => scenarios.into_iter().filter(|(n, _)| *n == "D").collect(),
            Scenario::E => scenarios.into_iter().filter(|(n, _)| *n == "E").collect(),
            Scenario::F => scenarios.into_iter().filter(|(n, _)| *n == "F").collect(),
        };

        for (name, run) in selected {
            info!(scenario = name, "running scenario");
            run()?;
        }

        Ok(())
    }
}
