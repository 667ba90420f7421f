//! # Conditions
//!
//! Pure functions turning rollout counters of the managed `DaemonSet` and the
//! outcome of a pass into the two user-facing conditions.
//!
//! ## Available
//!
//! Evaluated in order, first match wins:
//!
//! | # | Observation                         | Status  | Reason               |
//! |---|-------------------------------------|---------|----------------------|
//! | 1 | workload lookup: not found          | False   | `WorkloadNotFound`   |
//! | 2 | workload lookup: other failure      | Unknown | `WorkloadError`      |
//! | 3 | generation > observedGeneration     | Unknown | `OutOfSync`          |
//! | 4 | ready == 0 or desired == 0          | False   | `PodsNotRunning`     |
//! | 5 | updated < desired                   | Unknown | `RolloutInProgress`  |
//! | 6 | available < desired                 | Unknown | `PartiallyAvailable` |
//! | 7 | unavailable > 0                     | False   | `PartiallyAvailable` |
//! | 8 | otherwise                           | True    | `Ready`              |
//!
//! A failed pass downgrades the result to `Degraded` / `ReconcileError`.

use crate::constants::{CONDITION_AVAILABLE, CONDITION_RECONCILED, REQUIRED_CONDITIONS};
use crate::controller::store::StoreError;
use crate::crd::{Condition, ConditionStatus};
use k8s_openapi::api::apps::v1::DaemonSet;

pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
pub const REASON_WORKLOAD_NOT_FOUND: &str = "WorkloadNotFound";
pub const REASON_WORKLOAD_ERROR: &str = "WorkloadError";
pub const REASON_OUT_OF_SYNC: &str = "OutOfSync";
pub const REASON_PODS_NOT_RUNNING: &str = "PodsNotRunning";
pub const REASON_ROLLOUT_IN_PROGRESS: &str = "RolloutInProgress";
pub const REASON_PARTIALLY_AVAILABLE: &str = "PartiallyAvailable";
pub const REASON_READY: &str = "Ready";

/// Node counts reported by a `DaemonSet`, plus its generation skew
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloutCounters {
    pub desired: i32,
    pub current: i32,
    pub ready: i32,
    pub updated: i32,
    pub available: i32,
    pub unavailable: i32,
    pub generation: Option<i64>,
    pub observed_generation: Option<i64>,
}

impl RolloutCounters {
    #[must_use]
    pub fn from_daemon_set(daemon_set: &DaemonSet) -> Self {
        let status = daemon_set.status.clone().unwrap_or_default();
        Self {
            desired: status.desired_number_scheduled,
            current: status.current_number_scheduled,
            ready: status.number_ready,
            updated: status.updated_number_scheduled.unwrap_or(0),
            available: status.number_available.unwrap_or(0),
            unavailable: status.number_unavailable.unwrap_or(0),
            generation: daemon_set.metadata.generation,
            observed_generation: status.observed_generation,
        }
    }

    /// The controller has not yet observed the latest workload spec
    #[must_use]
    pub fn out_of_sync(&self) -> bool {
        match self.generation {
            Some(generation) => generation > self.observed_generation.unwrap_or(0),
            None => false,
        }
    }
}

/// Status, reason code and message of a derived condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: ConditionStatus,
    pub reason: &'static str,
    pub message: String,
}

impl Verdict {
    fn new(status: ConditionStatus, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
        }
    }

    /// Build a condition of `condition_type` for the given specification generation
    #[must_use]
    pub fn into_condition(self, condition_type: &str, generation: Option<i64>) -> Condition {
        Condition {
            r#type: condition_type.to_string(),
            status: self.status,
            observed_generation: generation,
            last_transition_time: None,
            reason: Some(self.reason.to_string()),
            message: Some(self.message),
        }
    }
}

/// Reconciled: did the last pass succeed
#[must_use]
pub fn reconciled(pass_error: Option<&str>) -> Verdict {
    match pass_error {
        None => Verdict::new(
            ConditionStatus::True,
            REASON_RECONCILE_SUCCESS,
            "reconcile succeeded",
        ),
        Some(error) => Verdict::new(ConditionStatus::False, REASON_RECONCILE_ERROR, error),
    }
}

/// Available: is the managed workload healthy
#[must_use]
pub fn available(workload: &Result<RolloutCounters, StoreError>, pass_error: Option<&str>) -> Verdict {
    let verdict = rollout_verdict(workload);
    if pass_error.is_some() {
        return Verdict::new(
            ConditionStatus::Degraded,
            REASON_RECONCILE_ERROR,
            format!("reconcile error ({})", verdict.message),
        );
    }
    verdict
}

fn rollout_verdict(workload: &Result<RolloutCounters, StoreError>) -> Verdict {
    let counters = match workload {
        Ok(counters) => counters,
        Err(StoreError::NotFound(_)) => {
            return Verdict::new(
                ConditionStatus::False,
                REASON_WORKLOAD_NOT_FOUND,
                "workload not found",
            )
        }
        Err(error) => {
            return Verdict::new(
                ConditionStatus::Unknown,
                REASON_WORKLOAD_ERROR,
                format!("workload error: {error}"),
            )
        }
    };

    if counters.out_of_sync() {
        Verdict::new(ConditionStatus::Unknown, REASON_OUT_OF_SYNC, "out of sync")
    } else if counters.ready == 0 || counters.desired == 0 {
        Verdict::new(
            ConditionStatus::False,
            REASON_PODS_NOT_RUNNING,
            "pods not running",
        )
    } else if counters.updated < counters.desired {
        Verdict::new(
            ConditionStatus::Unknown,
            REASON_ROLLOUT_IN_PROGRESS,
            format!(
                "rollout in progress: {}/{} nodes updated",
                counters.updated, counters.desired
            ),
        )
    } else if counters.available < counters.desired {
        Verdict::new(
            ConditionStatus::Unknown,
            REASON_PARTIALLY_AVAILABLE,
            format!(
                "partially available: {}/{} nodes available",
                counters.available, counters.desired
            ),
        )
    } else if counters.unavailable > 0 {
        Verdict::new(
            ConditionStatus::False,
            REASON_PARTIALLY_AVAILABLE,
            format!(
                "partially available: {} nodes unavailable",
                counters.unavailable
            ),
        )
    } else {
        Verdict::new(ConditionStatus::True, REASON_READY, "ready")
    }
}

/// Keep exactly the required condition types, in a fixed order. Missing types
/// are injected with status `False`; duplicates and unknown types are dropped.
#[must_use]
pub fn sanitize(conditions: &[Condition]) -> Vec<Condition> {
    REQUIRED_CONDITIONS
        .iter()
        .map(|required| {
            conditions
                .iter()
                .find(|condition| condition.r#type == *required)
                .cloned()
                .unwrap_or_else(|| Condition {
                    r#type: (*required).to_string(),
                    status: ConditionStatus::False,
                    observed_generation: None,
                    last_transition_time: None,
                    reason: None,
                    message: None,
                })
        })
        .collect()
}

/// Merge `desired` into `conditions`, returning whether anything comparable changed.
///
/// `lastTransitionTime` is set to `now` only when the status changes; a
/// reason or message change alone keeps the previous timestamp.
pub fn set_condition(conditions: &mut Vec<Condition>, mut desired: Condition, now: &str) -> bool {
    match conditions
        .iter_mut()
        .find(|existing| existing.r#type == desired.r#type)
    {
        Some(existing) => {
            if existing.same_observation(&desired) {
                return false;
            }
            desired.last_transition_time = if existing.status == desired.status {
                existing
                    .last_transition_time
                    .clone()
                    .or_else(|| Some(now.to_string()))
            } else {
                Some(now.to_string())
            };
            *existing = desired;
            true
        }
        None => {
            desired.last_transition_time = Some(now.to_string());
            conditions.push(desired);
            true
        }
    }
}

/// Sanitize `stored` and fold in both derived conditions.
/// Returns the new set and whether a write is needed.
#[must_use]
pub fn derive(
    stored: &[Condition],
    generation: Option<i64>,
    workload: &Result<RolloutCounters, StoreError>,
    pass_error: Option<&str>,
    now: &str,
) -> (Vec<Condition>, bool) {
    let mut conditions = sanitize(stored);
    let mut changed = conditions.as_slice() != stored;

    changed |= set_condition(
        &mut conditions,
        reconciled(pass_error).into_condition(CONDITION_RECONCILED, generation),
        now,
    );
    changed |= set_condition(
        &mut conditions,
        available(workload, pass_error).into_condition(CONDITION_AVAILABLE, generation),
        now,
    );

    (conditions, changed)
}
