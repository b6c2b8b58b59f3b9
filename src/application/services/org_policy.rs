//! Organization policy value object
//!
//! `Organization.config` is an arbitrary JSON policy blob; only the subset
//! the solver actually interprets is extracted here. Unrecognized keys are
//! ignored rather than rejected, so callers can attach forward-compatible
//! configuration the core doesn't yet read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a manual assignment's solver-preservation behavior is forced or
/// may be rebalanced. Defaults to preserved; see DESIGN.md.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ManualAssignmentPolicy {
    Preserve,
    Rebalanceable,
}

impl Default for ManualAssignmentPolicy {
    fn default() -> Self {
        ManualAssignmentPolicy::Preserve
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrgPolicy {
    pub manual_assignment: ManualAssignmentPolicy,
}

impl Default for OrgPolicy {
    fn default() -> Self {
        Self {
            manual_assignment: ManualAssignmentPolicy::Preserve,
        }
    }
}

impl OrgPolicy {
    /// Extracts the recognized subset of an organization's JSON config,
    /// falling back to defaults for anything absent or malformed.
    pub fn from_config(config: &Value) -> Self {
        let manual_assignment = config
            .get("manual_assignment_rebalanceable")
            .and_then(Value::as_bool)
            .map(|rebalanceable| {
                if rebalanceable {
                    ManualAssignmentPolicy::Rebalanceable
                } else {
                    ManualAssignmentPolicy::Preserve
                }
            })
            .unwrap_or_default();

        Self { manual_assignment }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_to_preserve_when_config_is_empty() {
        let policy = OrgPolicy::from_config(&json!({}));
        assert_eq!(policy.manual_assignment, ManualAssignmentPolicy::Preserve);
    }

    #[test]
    fn honors_explicit_rebalanceable_flag() {
        let policy = OrgPolicy::from_config(&json!({"manual_assignment_rebalanceable": true}));
        assert_eq!(policy.manual_assignment, ManualAssignmentPolicy::Rebalanceable);
    }

    #[test]
    fn ignores_unrecognized_keys() {
        let policy = OrgPolicy::from_config(&json!({"some_future_flag": "xyz"}));
        assert_eq!(policy, OrgPolicy::default());
    }
}
