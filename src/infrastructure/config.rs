//! Solver and store configuration
//!
//! A `Default` plus `with_*` builders, overridable from the environment,
//! covering the settings this crate actually reads: solver budgets/seed,
//! the calendar feed's cache TTL, and the org-default timezone fallback.
//! Call `RosterConfig::from_env` after
//! `dotenv::dotenv().ok()` to pick up a `.env` file in development.

use serde::{Deserialize, Serialize};

const DEFAULT_TIME_BUDGET_MS: u64 = 5_000;
const DEFAULT_BACKTRACK_BUDGET: u64 = 100_000;
const DEFAULT_CALENDAR_CACHE_TTL_MS: u64 = 60_000;
const DEFAULT_ORG_TIMEZONE: &str = "UTC";
const DEFAULT_DATABASE_PATH: &str = "roster.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    pub database_path: String,
    pub solver_time_budget_ms: u64,
    pub solver_backtrack_budget: u64,
    pub solver_seed: Option<u64>,
    pub calendar_cache_ttl_ms: u64,
    pub org_default_timezone: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            solver_time_budget_ms: DEFAULT_TIME_BUDGET_MS,
            solver_backtrack_budget: DEFAULT_BACKTRACK_BUDGET,
            solver_seed: None,
            calendar_cache_ttl_ms: DEFAULT_CALENDAR_CACHE_TTL_MS,
            org_default_timezone: DEFAULT_ORG_TIMEZONE.to_string(),
        }
    }
}

impl RosterConfig {
    pub fn new(database_path: String) -> Self {
        Self {
            database_path,
            ..Default::default()
        }
    }

    /// Reads overrides from the environment, falling back to defaults for
    /// anything unset or unparseable. Call `dotenv::dotenv().ok()` first
    /// if a `.env` file should be picked up.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ROSTER_DATABASE_PATH") {
            config.database_path = path;
        }
        if let Some(value) = parse_env("ROSTER_SOLVER_TIME_BUDGET_MS") {
            config.solver_time_budget_ms = value;
        }
        if let Some(value) = parse_env("ROSTER_SOLVER_BACKTRACK_BUDGET") {
            config.solver_backtrack_budget = value;
        }
        if let Some(value) = parse_env("ROSTER_SOLVER_SEED") {
            config.solver_seed = Some(value);
        }
        if let Some(value) = parse_env("ROSTER_CALENDAR_CACHE_TTL_MS") {
            config.calendar_cache_ttl_ms = value;
        }
        if let Ok(tz) = std::env::var("ROSTER_ORG_DEFAULT_TIMEZONE") {
            config.org_default_timezone = tz;
        }

        config
    }

    pub fn with_solver_time_budget_ms(mut self, ms: u64) -> Self {
        self.solver_time_budget_ms = ms;
        self
    }

    pub fn with_solver_backtrack_budget(mut self, budget: u64) -> Self {
        self.solver_backtrack_budget = budget;
        self
    }

    pub fn with_solver_seed(mut self, seed: u64) -> Self {
        self.solver_seed = Some(seed);
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RosterConfig::default();
        assert_eq!(config.solver_time_budget_ms, DEFAULT_TIME_BUDGET_MS);
        assert!(config.solver_seed.is_none());
    }

    #[test]
    fn builders_override_defaults() {
        let config = RosterConfig::default()
            .with_solver_time_budget_ms(1_000)
            .with_solver_backtrack_budget(50)
            .with_solver_seed(42);
        assert_eq!(config.solver_time_budget_ms, 1_000);
        assert_eq!(config.solver_backtrack_budget, 50);
        assert_eq!(config.solver_seed, Some(42));
    }
}
