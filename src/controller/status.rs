//! # Status Persistence
//!
//! Writes the `Reconciled` and `Available` conditions back onto a
//! specification instance after every pass.
//!
//! Each attempt re-fetches the instance, so the decision to write and the
//! resourceVersion used for the write always come from the same read. The
//! whole attempt is retried on optimistic-concurrency conflicts.

use crate::controller::conditions::{self, RolloutCounters};
use crate::controller::retry::{retry_with_backoff, RetryPolicy};
use crate::controller::finalizer::is_deleting;
use crate::controller::store::{api_resource, ObjectKey, ObjectStore, StoreError};
use crate::crd::Condition;
use crate::observability;
use k8s_openapi::api::apps::v1::DaemonSet;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::json;
use tracing::{debug, info, warn};

/// What a persist call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Written,
    /// Derived conditions matched the stored ones
    Unchanged,
    /// Instance absent or being deleted
    Skipped,
}

/// Persists derived conditions for one specification instance
#[derive(Debug, Clone)]
pub struct StatusPersister {
    pub resource: ApiResource,
    pub key: ObjectKey,
    /// The `DaemonSet` whose rollout decides `Available`
    pub workload: ObjectKey,
    pub policy: RetryPolicy,
}

impl StatusPersister {
    #[must_use]
    pub fn new(resource: ApiResource, key: ObjectKey, workload: ObjectKey) -> Self {
        Self {
            resource,
            key,
            workload,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Persist conditions for a pass that ended with `pass_error`
    pub async fn persist(
        &self,
        store: &dyn ObjectStore,
        pass_error: Option<&str>,
    ) -> Result<StatusWrite, StoreError> {
        let operation = format!("update status of {} {}", self.resource.kind, self.key);
        let outcome = retry_with_backoff(&self.policy, &operation, StoreError::is_conflict, || {
            self.attempt(store, pass_error)
        })
        .await;

        match &outcome {
            Ok(StatusWrite::Written) => observability::metrics::increment_status_updates(),
            Ok(StatusWrite::Unchanged) => {
                observability::metrics::increment_status_updates_skipped();
            }
            Ok(StatusWrite::Skipped) => {}
            Err(e) => warn!(resource = %self.key, error = %e, "Failed to update status"),
        }
        outcome
    }

    async fn attempt(
        &self,
        store: &dyn ObjectStore,
        pass_error: Option<&str>,
    ) -> Result<StatusWrite, StoreError> {
        let mut instance = match store.get(&self.resource, &self.key).await {
            Ok(instance) => instance,
            Err(StoreError::NotFound(_)) => {
                debug!(resource = %self.key, "instance gone, skipping status update");
                return Ok(StatusWrite::Skipped);
            }
            Err(e) => return Err(e),
        };
        if is_deleting(&instance.metadata) {
            debug!(resource = %self.key, "instance deleting, skipping status update");
            return Ok(StatusWrite::Skipped);
        }

        let stored = stored_conditions(&instance);
        let workload = self.observe_workload(store).await;
        let now = chrono::Utc::now().to_rfc3339();
        let (conditions, changed) = conditions::derive(
            &stored,
            instance.metadata.generation,
            &workload,
            pass_error,
            &now,
        );

        if !changed {
            debug!(resource = %self.key, "Skipping status update - conditions unchanged");
            return Ok(StatusWrite::Unchanged);
        }

        instance.data["status"] = json!({ "conditions": conditions });
        store.replace_status(&self.resource, &instance).await?;
        info!(
            resource = %self.key,
            generation = ?instance.metadata.generation,
            "Updated status conditions"
        );
        Ok(StatusWrite::Written)
    }

    async fn observe_workload(
        &self,
        store: &dyn ObjectStore,
    ) -> Result<RolloutCounters, StoreError> {
        let object = store
            .get(&api_resource::<DaemonSet>(), &self.workload)
            .await?;
        let daemon_set: DaemonSet = serde_json::to_value(object)
            .and_then(serde_json::from_value)
            .map_err(|e| StoreError::Request(format!("malformed DaemonSet {}: {e}", self.workload)))?;
        Ok(RolloutCounters::from_daemon_set(&daemon_set))
    }
}

/// Conditions currently stored on a dynamic instance. Unreadable conditions
/// are treated as absent; sanitization rebuilds them.
fn stored_conditions(instance: &DynamicObject) -> Vec<Condition> {
    instance
        .data
        .get("status")
        .and_then(|status| status.get("conditions"))
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}
