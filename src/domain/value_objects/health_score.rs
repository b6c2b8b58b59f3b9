//! Health score value object module
//!
//! `HealthScore` represents the weighted coverage/fairness/diversity
//! quality of a Solution, always clamped to `[0, 1]`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Weights used to combine the three soft-objective components into one
/// scalar. These are a starting point, not derived from production
/// tuning; see DESIGN.md.
pub const COVERAGE_WEIGHT: f64 = 0.6;
pub const FAIRNESS_WEIGHT: f64 = 0.3;
pub const DIVERSITY_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct HealthScore(f64);

impl HealthScore {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Combines coverage, fairness, and diversity components (each already
    /// expected to be in `[0, 1]`) into the weighted health score.
    pub fn from_components(coverage: f64, fairness_norm: f64, diversity: f64) -> Self {
        let score = coverage * COVERAGE_WEIGHT
            + fairness_norm * FAIRNESS_WEIGHT
            + diversity * DIVERSITY_WEIGHT;
        Self::new(score)
    }

    /// `fairness_norm = 1 - (stddev / mean)`, guarded against a zero mean
    /// (an empty or demand-free solution is perfectly "fair" by
    /// definition, since there is nothing to be unfair about).
    pub fn fairness_norm(mean: f64, stddev: f64) -> f64 {
        if mean <= f64::EPSILON {
            1.0
        } else {
            (1.0 - stddev / mean).clamp(0.0, 1.0)
        }
    }
}

impl fmt::Display for HealthScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl From<HealthScore> for f64 {
    fn from(score: HealthScore) -> Self {
        score.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(HealthScore::new(1.5).value(), 1.0);
        assert_eq!(HealthScore::new(-0.5).value(), 0.0);
    }

    #[test]
    fn weights_sum_to_one() {
        assert!((COVERAGE_WEIGHT + FAIRNESS_WEIGHT + DIVERSITY_WEIGHT - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fairness_norm_guards_zero_mean() {
        assert_eq!(HealthScore::fairness_norm(0.0, 0.0), 1.0);
    }

    #[test]
    fn from_components_matches_weighted_sum() {
        let score = HealthScore::from_components(1.0, 1.0, 1.0);
        assert_eq!(score.value(), 1.0);

        let score = HealthScore::from_components(0.5, 0.0, 0.0);
        assert!((score.value() - 0.3).abs() < 1e-9);
    }
}
