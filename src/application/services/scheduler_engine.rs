//! Scheduler Engine service module
//!
//! The constraint-satisfaction solver. Given an event set and an
//! `AvailabilityIndex`, produces a `Solution` that maximizes covered
//! role-demand under the hard constraints (H1-H5), scored by the soft
//! objectives (S1-S4).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::services::availability_index::AvailabilityIndex;
use crate::domain::entities::{Assignment, Event, EventId, OrgId, PersonId, Solution};

/// Tunables named in the external-interfaces configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    pub time_budget_ms: u64,
    pub backtrack_budget: u64,
    /// When absent, `solve` derives one via a stable hash of the org id and
    /// sorted event id list so reruns of identical input stay deterministic.
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_budget_ms: 5000,
            backtrack_budget: 100_000,
            seed: None,
        }
    }
}

impl SolverConfig {
    pub fn with_time_budget_ms(mut self, ms: u64) -> Self {
        self.time_budget_ms = ms;
        self
    }

    pub fn with_backtrack_budget(mut self, budget: u64) -> Self {
        self.backtrack_budget = budget;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Stable FNV-1a hash of an org id and its sorted event ids, used as the
/// solver seed when the caller doesn't supply one (§6 default).
pub fn derive_seed(org_id: OrgId, event_ids: &[EventId]) -> u64 {
    let mut sorted: Vec<String> = event_ids.iter().map(|id| id.to_string()).collect();
    sorted.sort();
    let mut input = org_id.to_string();
    for id in sorted {
        input.push('|');
        input.push_str(&id);
    }
    fnv1a(input.as_bytes())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Cooperative cancellation handle. Cloning shares the same underlying flag;
/// checked between events and at every backtrack, per the concurrency
/// model's suspension points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A single `(event, role)` unit of demand to fill, flattened one-per-slot
/// out of `role_demand` so the backtracking search operates over
/// individually assignable variables. `static_has_candidates` records
/// whether the variable had any legal candidate before the search made any
/// choices, so an empty live candidate set later can be told apart from a
/// true impossibility (shortage) versus a self-inflicted conflict worth
/// backtracking over.
struct Variable {
    event_id: EventId,
    role: String,
    static_has_candidates: bool,
}

/// One committed choice in the search stack, retained so the search can
/// undo it and resume trying this variable's remaining candidates.
struct Frame {
    var_idx: usize,
    event_id: EventId,
    candidates: Vec<PersonId>,
    next_try: usize,
    committed: PersonId,
}

pub struct SchedulerEngine;

impl SchedulerEngine {
    /// Solves for `events` against `index`, returning the Solution record and
    /// the assignment list (manual assignments passed in `existing_manual`
    /// are preserved untouched and reported as already filling their slot).
    ///
    /// # Arguments
    ///
    /// * `org_id` - organization the solve belongs to
    /// * `events` - the materialized occurrences to staff
    /// * `index` - availability snapshot; mutated in place as the search commits candidates
    /// * `existing_manual` - manual assignments the search must preserve (S4)
    /// * `config` - time/backtrack budget and seed
    /// * `cancel` - cooperative cancellation flag
    pub fn solve(
        org_id: OrgId,
        mut events: Vec<Event>,
        index: &mut AvailabilityIndex,
        existing_manual: &[Assignment],
        config: &SolverConfig,
        cancel: &CancelToken,
    ) -> (Solution, Vec<Assignment>) {
        events.sort_by_key(|e| e.id.as_uuid());
        let events_by_id: HashMap<EventId, Event> = events.iter().cloned().map(|e| (e.id, e)).collect();

        let manual_counts = manual_counts_by_event_role(existing_manual);
        let mut event_used: HashMap<EventId, HashSet<PersonId>> = HashMap::new();
        for a in existing_manual {
            event_used.entry(a.event_id).or_default().insert(a.person_id);
        }

        let variables = build_variables(&events, &manual_counts, &events_by_id, index);

        let window_start = events.iter().map(|e| e.start_time).min().unwrap_or_else(Utc::now);
        let window_end = events.iter().map(|e| e.end_time).max().unwrap_or_else(Utc::now);
        let deadline = Instant::now() + Duration::from_millis(config.time_budget_ms);

        let mut filled: Vec<(usize, PersonId)> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut backtracks: u64 = 0;
        let mut was_cancelled = false;

        let mut position = 0usize;
        while position < variables.len() {
            if cancel.is_cancelled() {
                was_cancelled = true;
                break;
            }
            if Instant::now() >= deadline {
                break;
            }

            let var = &variables[position];
            let event = &events_by_id[&var.event_id];
            let used = event_used.entry(var.event_id).or_default();
            let mut candidates: Vec<PersonId> = index
                .candidates(event, &var.role)
                .into_iter()
                .filter(|p| !used.contains(p))
                .collect();
            order_by_workload(&mut candidates, index, window_start, window_end);

            if candidates.is_empty() {
                if var.static_has_candidates && !frames.is_empty() && backtracks < config.backtrack_budget {
                    backtracks += 1;
                    debug!(event_id = %var.event_id, role = %var.role, "backtracking: own choices starved this variable");
                    if backtrack(&mut frames, &mut position, index, &mut event_used, &mut filled) {
                        continue;
                    }
                }
                // Either a true impossibility, or backtracking budget/stack
                // exhausted: accept the shortage at this slot and move on.
                position += 1;
                continue;
            }

            let choice = candidates[0];
            index.record_assignment(choice, event);
            event_used.entry(var.event_id).or_default().insert(choice);
            filled.push((position, choice));
            frames.push(Frame {
                var_idx: position,
                event_id: var.event_id,
                candidates,
                next_try: 1,
                committed: choice,
            });
            position += 1;
        }

        let now = Utc::now();
        let mut solution = Solution::new(org_id, now);
        let solution_id = solution.id;

        let mut assignments: Vec<Assignment> = existing_manual.to_vec();
        for (var_idx, person_id) in &filled {
            let var = &variables[*var_idx];
            assignments.push(Assignment::new_solved(solution_id, var.event_id, *person_id, var.role.clone(), now));
        }

        solution.metrics = compute_metrics(&events, &assignments, index, backtracks, was_cancelled);
        solution.health_score = health_score_for(&events, &assignments, index);

        info!(
            org_id = %org_id,
            health_score = %solution.health_score,
            filled = solution.metrics.filled,
            total_demand = solution.metrics.total_demand,
            backtracks,
            "solve completed"
        );

        (solution, assignments)
    }
}

fn manual_counts_by_event_role(manual: &[Assignment]) -> HashMap<(EventId, String), u32> {
    let mut counts = HashMap::new();
    for a in manual {
        *counts.entry((a.event_id, a.role.clone())).or_insert(0u32) += 1;
    }
    counts
}

/// Builds the flattened slot-variable list, ordered by ascending static
/// candidate-set size (most-constrained first), tie-broken by event id then
/// role name — the variable ordering named in §4.2.
fn build_variables(
    events: &[Event],
    manual_counts: &HashMap<(EventId, String), u32>,
    events_by_id: &HashMap<EventId, Event>,
    index: &AvailabilityIndex,
) -> Vec<Variable> {
    #[derive(Clone)]
    struct Raw {
        event_id: EventId,
        role: String,
    }

    let mut raw = Vec::new();
    for event in events {
        for (role, demand) in &event.role_demand {
            let already = manual_counts.get(&(event.id, role.clone())).copied().unwrap_or(0);
            let remaining = demand.saturating_sub(already);
            for _ in 0..remaining {
                raw.push(Raw {
                    event_id: event.id,
                    role: role.clone(),
                });
            }
        }
    }

    let candidate_count = |r: &Raw| -> usize {
        let event = &events_by_id[&r.event_id];
        index.candidates(event, &r.role).len()
    };

    raw.sort_by(|a, b| {
        candidate_count(a)
            .cmp(&candidate_count(b))
            .then_with(|| a.event_id.as_uuid().cmp(&b.event_id.as_uuid()))
            .then_with(|| a.role.cmp(&b.role))
    });

    raw.into_iter()
        .map(|r| {
            let has_candidates = candidate_count(&r) > 0;
            Variable {
                event_id: r.event_id,
                role: r.role,
                static_has_candidates: has_candidates,
            }
        })
        .collect()
}

/// Value ordering: least-used person first (fairness hint), then id order.
fn order_by_workload(
    candidates: &mut [PersonId],
    index: &AvailabilityIndex,
    window_start: chrono::DateTime<Utc>,
    window_end: chrono::DateTime<Utc>,
) {
    candidates.sort_by(|a, b| {
        let wa = index.workload(*a, window_start, window_end);
        let wb = index.workload(*b, window_start, window_end);
        wa.cmp(&wb).then_with(|| a.as_uuid().cmp(&b.as_uuid()))
    });
}

/// Undoes the top frame, then attempts its next candidate. If a frame's
/// candidates are exhausted, pops further back (chronological backtracking).
/// Returns `false` once the stack is empty with no alternative left to try.
fn backtrack(
    frames: &mut Vec<Frame>,
    position: &mut usize,
    index: &mut AvailabilityIndex,
    event_used: &mut HashMap<EventId, HashSet<PersonId>>,
    filled: &mut Vec<(usize, PersonId)>,
) -> bool {
    while let Some(mut frame) = frames.pop() {
        index.retract_assignment(frame.committed, frame.event_id);
        if let Some(used) = event_used.get_mut(&frame.event_id) {
            used.remove(&frame.committed);
        }
        filled.retain(|(idx, _)| *idx != frame.var_idx);

        if frame.next_try < frame.candidates.len() {
            let choice = frame.candidates[frame.next_try];
            frame.next_try += 1;
            *position = frame.var_idx;
            frame.committed = choice;
            frames.push(frame);
            return true;
        }
        // This frame has no alternatives left; keep popping further back.
    }
    false
}

fn compute_metrics(
    events: &[Event],
    assignments: &[Assignment],
    index: &AvailabilityIndex,
    backtracks: u64,
    was_cancelled: bool,
) -> crate::domain::entities::SolutionMetrics {
    use crate::domain::entities::SolutionMetrics;
    use crate::domain::entities::solution::ShortageByEvent;

    let total_demand: u32 = events.iter().map(Event::total_demand).sum();

    let mut filled_by_role: HashMap<(EventId, String), u32> = HashMap::new();
    for a in assignments {
        *filled_by_role.entry((a.event_id, a.role.clone())).or_insert(0) += 1;
    }

    let mut unfilled_by_event: ShortageByEvent = BTreeMap::new();
    for event in events {
        let mut shortage_for_event = BTreeMap::new();
        for (role, demand) in &event.role_demand {
            let filled = filled_by_role.get(&(event.id, role.clone())).copied().unwrap_or(0);
            if filled < *demand {
                shortage_for_event.insert(role.clone(), demand - filled);
            }
        }
        if !shortage_for_event.is_empty() {
            unfilled_by_event.insert(event.id, shortage_for_event);
        }
    }

    let mut per_person_count: BTreeMap<String, u32> = BTreeMap::new();
    for id in index.known_person_ids() {
        per_person_count.insert(id.to_string(), 0);
    }
    for a in assignments {
        *per_person_count.entry(a.person_id.to_string()).or_insert(0) += 1;
    }

    let filled: u32 = filled_by_role.values().sum();

    SolutionMetrics {
        total_demand,
        filled,
        unfilled_by_event,
        per_person_count,
        backtracks,
        was_cancelled,
    }
}

fn health_score_for(
    events: &[Event],
    assignments: &[Assignment],
    index: &AvailabilityIndex,
) -> crate::domain::value_objects::HealthScore {
    use crate::domain::value_objects::HealthScore;

    let total_demand: u32 = events.iter().map(Event::total_demand).sum();
    let filled = assignments.len() as u32;
    let coverage = if total_demand == 0 {
        1.0
    } else {
        filled.min(total_demand) as f64 / total_demand as f64
    };

    let mut counts: HashMap<PersonId, u32> = index.known_person_ids().into_iter().map(|id| (id, 0)).collect();
    for a in assignments {
        *counts.entry(a.person_id).or_insert(0) += 1;
    }
    let (mean, stddev) = mean_and_stddev(counts.values().copied());
    let fairness_norm = HealthScore::fairness_norm(mean, stddev);
    let diversity = role_diversity(assignments);

    HealthScore::from_components(coverage, fairness_norm, diversity)
}

fn mean_and_stddev(values: impl Iterator<Item = u32>) -> (f64, f64) {
    let values: Vec<f64> = values.map(|v| v as f64).collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance.sqrt())
}

/// S3: for each role, the fraction of that role's assignments that went to
/// distinct people (1.0 when no one repeats a role, lower when the same
/// person is reused), weighted by how many assignments that role has.
fn role_diversity(assignments: &[Assignment]) -> f64 {
    if assignments.is_empty() {
        return 1.0;
    }
    let mut by_role: HashMap<&str, Vec<PersonId>> = HashMap::new();
    for a in assignments {
        by_role.entry(a.role.as_str()).or_default().push(a.person_id);
    }
    let mut weighted_sum = 0.0;
    let mut total = 0.0;
    for people in by_role.values() {
        let distinct: HashSet<PersonId> = people.iter().copied().collect();
        let ratio = distinct.len() as f64 / people.len() as f64;
        weighted_sum += ratio * people.len() as f64;
        total += people.len() as f64;
    }
    weighted_sum / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{OrgId, Person};
    use chrono::TimeZone;

    fn person(org: OrgId, role: &str) -> Person {
        Person::new(org, format!("{role}-{}@example.org", uuid::Uuid::new_v4()), role.to_string()).with_role(role)
    }

    #[test]
    fn simple_assignment_picks_lexicographic_winner() {
        let org = OrgId::new();
        let p1 = person(org, "usher");
        let p2 = person(org, "usher");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
        let event = Event::new(org, "service", start, end).with_demand("usher", 1);

        let mut people = vec![p1, p2];
        people.sort_by_key(|p| p.id.as_uuid());
        let mut index = AvailabilityIndex::build(people, vec![], vec![], "UTC");

        let (solution, assignments) = SchedulerEngine::solve(
            org,
            vec![event.clone()],
            &mut index,
            &[],
            &SolverConfig::default(),
            &CancelToken::new(),
        );

        assert_eq!(assignments.len(), 1);
        assert_eq!(solution.metrics.filled, 1);
        assert_eq!(solution.metrics.total_demand, 1);
        assert!(solution.health_score.value() > 0.9);
    }

    #[test]
    fn over_demand_produces_recorded_shortage() {
        let org = OrgId::new();
        let p1 = person(org, "usher");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
        let event = Event::new(org, "service", start, end).with_demand("usher", 2);

        let mut index = AvailabilityIndex::build(vec![p1], vec![], vec![], "UTC");
        let (solution, assignments) = SchedulerEngine::solve(
            org,
            vec![event.clone()],
            &mut index,
            &[],
            &SolverConfig::default(),
            &CancelToken::new(),
        );

        assert_eq!(assignments.len(), 1);
        let shortage = solution.metrics.unfilled_by_event.get(&event.id).unwrap();
        assert_eq!(shortage.get("usher"), Some(&1));
        assert!(!solution.metrics.was_cancelled);
    }

    #[test]
    fn double_booking_never_assigns_same_person_to_both_events() {
        let org = OrgId::new();
        let p1 = person(org, "usher");
        let p2 = person(org, "usher");
        let e1 = Event::new(
            org,
            "service",
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap(),
        )
        .with_demand("usher", 1);
        let e2 = Event::new(
            org,
            "service",
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 11, 30, 0).unwrap(),
        )
        .with_demand("usher", 1);

        let mut index = AvailabilityIndex::build(vec![p1, p2], vec![], vec![], "UTC");
        let (_solution, assignments) = SchedulerEngine::solve(
            org,
            vec![e1, e2],
            &mut index,
            &[],
            &SolverConfig::default(),
            &CancelToken::new(),
        );

        let people_assigned: Vec<PersonId> = assignments.iter().map(|a| a.person_id).collect();
        assert_eq!(people_assigned.len(), 2);
        assert_ne!(people_assigned[0], people_assigned[1]);
    }

    #[test]
    fn determinism_same_seed_same_output() {
        let org = OrgId::new();
        let p1 = person(org, "usher");
        let p2 = person(org, "usher");
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
        let event = Event::new(org, "service", start, end).with_demand("usher", 1);

        let run = |config: &SolverConfig| {
            let mut people = vec![p1.clone(), p2.clone()];
            people.sort_by_key(|p| p.id.as_uuid());
            let mut index = AvailabilityIndex::build(people, vec![], vec![], "UTC");
            let (solution, assignments) =
                SchedulerEngine::solve(org, vec![event.clone()], &mut index, &[], config, &CancelToken::new());
            (
                solution.health_score.value(),
                assignments.into_iter().map(|a| a.person_id).collect::<Vec<_>>(),
            )
        };

        let config = SolverConfig::default().with_seed(42);
        assert_eq!(run(&config), run(&config));
    }

    proptest::proptest! {
        /// H1: a single event's role never receives more filled slots than
        /// its demand, whatever the pool size.
        #[test]
        fn never_fills_past_demand(num_people in 1usize..12, demand in 1u32..6) {
            let org = OrgId::new();
            let mut people: Vec<Person> = (0..num_people).map(|_| person(org, "usher")).collect();
            people.sort_by_key(|p| p.id.as_uuid());
            let start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
            let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
            let event = Event::new(org, "service", start, end).with_demand("usher", demand);

            let mut index = AvailabilityIndex::build(people, vec![], vec![], "UTC");
            let (_solution, assignments) = SchedulerEngine::solve(
                org,
                vec![event],
                &mut index,
                &[],
                &SolverConfig::default(),
                &CancelToken::new(),
            );

            let filled = assignments.len() as u32;
            prop_assert!(filled <= demand);
            prop_assert!(filled <= num_people as u32);
        }

        /// H2: a person never ends up assigned to two events that overlap in
        /// time, across any pool size or event spacing.
        #[test]
        fn never_double_books_overlapping_events(num_people in 1usize..6, overlap_minutes in 0i64..90) {
            let org = OrgId::new();
            let mut people: Vec<Person> = (0..num_people).map(|_| person(org, "usher")).collect();
            people.sort_by_key(|p| p.id.as_uuid());

            let e1_start = Utc.with_ymd_and_hms(2024, 3, 10, 10, 0, 0).unwrap();
            let e1_end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
            let e2_start = e1_start + chrono::Duration::minutes(60 - overlap_minutes);
            let e2_end = e2_start + chrono::Duration::hours(1);

            let e1 = Event::new(org, "service", e1_start, e1_end).with_demand("usher", 1);
            let e2 = Event::new(org, "service", e2_start, e2_end).with_demand("usher", 1);

            let mut index = AvailabilityIndex::build(people, vec![], vec![], "UTC");
            let (_solution, assignments) = SchedulerEngine::solve(
                org,
                vec![e1, e2],
                &mut index,
                &[],
                &SolverConfig::default(),
                &CancelToken::new(),
            );

            let overlaps = overlap_minutes > 0;
            if overlaps {
                let people_assigned: HashSet<PersonId> = assignments.iter().map(|a| a.person_id).collect();
                prop_assert_eq!(people_assigned.len(), assignments.len());
            }
        }
    }
}
