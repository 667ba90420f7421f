//! # Reconciler
//!
//! The control loop shared by every specification kind.
//!
//! A pass over one instance:
//!
//! 1. deleting without the cleanup marker: nothing left to do
//! 2. build the step list: creation order while live, deletion order while deleting
//! 3. append the finalizer, which adds or removes the cleanup marker
//! 4. run the steps
//! 5. persist the `Reconciled` and `Available` conditions; a write that
//!    exhausts its retries fails an otherwise clean pass
//!
//! The finalizer runs last. Essential steps stop the pass on failure, so the
//! marker is only added once everything before it converged.
//!
//! Per-kind step lists live in `node_agent` and `node_scanner`. Credential
//! secrets have a loop of their own, [`reconcile_credential`].

mod node_agent;
mod node_scanner;
mod types;

pub use types::{BackoffState, Context, ReconcilerError};

use crate::constants::CLEANUP_FINALIZER;
use crate::config::OperatorConfig;
use crate::controller::action::Action;
use crate::controller::credentials::{self, ExpiryDecision};
use crate::controller::deleter::Deleter;
use crate::controller::error::Error;
use crate::controller::finalizer::{has_marker, is_deleting, Finalizer};
use crate::controller::runner::{RunOutcome, Schedule};
use crate::controller::status::StatusPersister;
use crate::controller::step::Step;
use crate::controller::store::{api_resource, ManagedObject, ObjectId, ObjectKey, Owner};
use crate::controller::updater::Updater;
use crate::observability;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use kube::Resource;
use kube_runtime::controller::Action as ControllerAction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, Instrument};

/// A specification kind driven by the generic control loop
pub trait ManagedKind:
    Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static
{
    /// Steps converging a live instance, in creation order
    fn apply_steps(&self, config: &OperatorConfig) -> Result<Vec<Step>, Error>;

    /// Explicit cleanup of a deleting instance, in deletion order.
    /// Everything else is garbage collected through owner references.
    fn cleanup_steps(&self, config: &OperatorConfig) -> Result<Vec<Step>, Error>;

    /// The `DaemonSet` whose rollout decides the `Available` condition
    fn workload_key(&self, config: &OperatorConfig) -> ObjectKey;

    /// Delay before the next pass when nothing else triggers one
    fn idle_requeue(&self, _config: &OperatorConfig) -> Option<Duration> {
        None
    }
}

/// Step applying a typed desired object under `owner`
pub(crate) fn apply<T>(owner: &Owner, desired: &T, on_error: Action) -> Result<Step, Error>
where
    T: Resource<DynamicType = ()> + Serialize,
{
    Ok(Step::Apply(
        Updater::new(owner.clone(), ManagedObject::from_typed(desired)?).on_error(on_error),
    ))
}

/// Step deleting the object identified by a metadata-only template
pub(crate) fn delete<T>(identity: &T, on_error: Action) -> Result<Step, Error>
where
    T: Resource<DynamicType = ()> + Serialize,
{
    Ok(Step::Delete(
        Deleter::new(ManagedObject::from_typed(identity)?).on_error(on_error),
    ))
}

/// Run one pass over `instance` and persist its conditions
pub async fn run_pass<K: ManagedKind>(instance: &K, ctx: &Context) -> RunOutcome {
    let meta = instance.meta();
    let deleting = is_deleting(meta);

    if deleting && !has_marker(meta, CLEANUP_FINALIZER) {
        debug!("deleting without cleanup marker, nothing to do");
        return RunOutcome {
            schedule: Schedule::Idle,
            error: None,
        };
    }

    let key = ObjectKey::of(meta);
    let steps = if deleting {
        instance.cleanup_steps(&ctx.config)
    } else {
        instance.apply_steps(&ctx.config)
    };

    let mut outcome = match steps {
        Ok(mut steps) => {
            steps.push(Step::Finalize(Finalizer::new(
                api_resource::<K>(),
                key.clone(),
                CLEANUP_FINALIZER,
            )));
            ctx.runner.run(&steps, ctx.store.as_ref()).await
        }
        Err(error) => RunOutcome {
            schedule: Schedule::Soon,
            error: Some(error),
        },
    };

    let persister = StatusPersister::new(
        api_resource::<K>(),
        key.clone(),
        instance.workload_key(&ctx.config),
    )
    .with_policy(ctx.status_retry);
    let pass_error = outcome.error.as_ref().map(ToString::to_string);
    let written = persister
        .persist(ctx.store.as_ref(), pass_error.as_deref())
        .await;

    // A step error outranks a failed status write
    if outcome.error.is_none() {
        if let Err(source) = written {
            outcome.error = Some(Error::Status {
                object: ObjectId::new(K::kind(&()), key),
                source,
            });
        }
    }

    outcome
}

/// Map a pass outcome onto controller scheduling
#[must_use]
pub fn schedule_action(schedule: Schedule, idle_requeue: Option<Duration>) -> ControllerAction {
    match schedule {
        Schedule::Soon => ControllerAction::requeue(Duration::ZERO),
        Schedule::After(delay) => ControllerAction::requeue(delay),
        Schedule::Idle => match idle_requeue {
            Some(interval) => ControllerAction::requeue(interval),
            None => ControllerAction::await_change(),
        },
    }
}

/// Key identifying a resource in the backoff table
#[must_use]
pub fn resource_key<K: ManagedKind>(instance: &K) -> String {
    format!("{}/{}", K::kind(&()), ObjectKey::of(instance.meta()))
}

/// Reconcile entry point for `kube_runtime::Controller`
pub async fn reconcile<K: ManagedKind>(
    instance: Arc<K>,
    ctx: Arc<Context>,
) -> Result<ControllerAction, ReconcilerError> {
    let kind = K::kind(&()).to_string();
    let key = ObjectKey::of(instance.meta());
    let span = tracing::info_span!(
        "controller.reconcile",
        resource.kind = %kind,
        resource.name = %key.name,
        resource.namespace = key.namespace.as_deref().unwrap_or(""),
        resource.generation = instance.meta().generation.unwrap_or(0),
    );

    async move {
        let started = Instant::now();
        observability::metrics::increment_reconciliations(&kind);

        let outcome = run_pass(instance.as_ref(), &ctx).await;
        observability::metrics::observe_reconciliation_duration(
            &kind,
            started.elapsed().as_secs_f64(),
        );

        if let Some(source) = outcome.error {
            error!(error = %source, "Reconciliation failed");
            return Err(ReconcilerError::Pass { kind, key, source });
        }

        ctx.reset_backoff(&resource_key(instance.as_ref()));
        let action = schedule_action(outcome.schedule, instance.idle_requeue(&ctx.config));
        match outcome.schedule {
            Schedule::Soon => observability::metrics::increment_requeues_total("step-stop"),
            Schedule::After(_) => observability::metrics::increment_requeues_total("step-requeue"),
            Schedule::Idle => info!("Reconciliation complete"),
        }
        Ok(action)
    }
    .instrument(span)
    .await
}

/// Reconcile entry point of the credential expiry loop
pub async fn reconcile_credential(
    secret: Arc<Secret>,
    ctx: Arc<Context>,
) -> Result<ControllerAction, ReconcilerError> {
    check_credential(&secret, &ctx, Utc::now()).await
}

async fn check_credential(
    secret: &Secret,
    ctx: &Context,
    now: DateTime<Utc>,
) -> Result<ControllerAction, ReconcilerError> {
    if is_deleting(&secret.metadata) {
        return Ok(ControllerAction::await_change());
    }

    let key = ObjectKey::of(&secret.metadata);
    let decision = credentials::reconcile_secret(
        ctx.store.as_ref(),
        &key,
        secret.metadata.annotations.as_ref(),
        now,
        ctx.config.token_refresh_interval,
    )
    .await
    .map_err(|source| ReconcilerError::Expiry {
        key: key.clone(),
        source,
    })?;

    Ok(match decision {
        ExpiryDecision::RecheckIn(delay) => {
            debug!(secret = %key, delay_secs = delay.as_secs(), "Credential not due yet");
            ControllerAction::requeue(delay)
        }
        // The deletion itself triggers the owning agent's next pass
        ExpiryDecision::Delete(_) => ControllerAction::await_change(),
    })
}
