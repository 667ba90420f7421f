//! # Agent Status
//!
//! Status types shared by every specification kind.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of a NodeAgent or NodeScanner resource
///
/// Only conditions are persisted. The set of condition types is always exactly
/// `Reconciled` and `Available` once the operator has written it.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition status values
///
/// `Degraded` extends the usual True/False/Unknown triple: the workload may be
/// serving, but the last reconcile failed.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
    Degraded,
}

impl ConditionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
            ConditionStatus::Degraded => "Degraded",
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition
    pub status: ConditionStatus,
    /// Generation of the specification this condition was computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last time the status changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Compare the fields that decide whether a status write is needed.
    /// `lastTransitionTime` is deliberately excluded.
    #[must_use]
    pub fn same_observation(&self, other: &Condition) -> bool {
        self.observed_generation == other.observed_generation
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}
