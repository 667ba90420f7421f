//! # Error Policy
//!
//! Requeue policy for failed passes. Backoff grows along the Fibonacci
//! sequence per resource and is reset by the next clean pass.

use crate::controller::reconciler::{resource_key, BackoffState, Context, ManagedKind, ReconcilerError};
use crate::observability;
use k8s_openapi::api::core::v1::Secret;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle a failed pass of a specification instance with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing instance never slows
/// down the others.
pub fn handle_reconciliation_error<K: ManagedKind>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Context>,
) -> Action {
    let kind = K::kind(&()).to_string();
    let name = obj.meta().name.as_deref().unwrap_or("unknown");
    let namespace = obj.meta().namespace.as_deref().unwrap_or("");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}: {:?}", kind, name, error);
    observability::metrics::increment_reconciliation_errors(&kind);

    backoff_action(&ctx, &resource_key(obj.as_ref()))
}

/// Handle a failed expiry check of a credential secret
pub fn handle_credential_error(obj: Arc<Secret>, error: &ReconcilerError, ctx: Arc<Context>) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("");

    error!(secret.name = name, secret.namespace = namespace, error = %error, "Credential expiry check failed");
    observability::metrics::increment_reconciliation_errors("Secret");

    backoff_action(&ctx, &format!("Secret/{namespace}/{name}"))
}

fn backoff_action(ctx: &Context, resource_key: &str) -> Action {
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key.to_string()).or_insert_with(|| {
                BackoffState::new(
                    ctx.config.error_backoff_min_secs,
                    ctx.config.error_backoff_max_secs,
                )
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
            (ctx.config.error_backoff_max_secs, 0)
        }
    };

    info!(
        resource = resource_key,
        "Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds,
        error_count
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::controller::error::Error;
    use crate::controller::store::{MockObjectStore, ObjectId, ObjectKey, StoreError};
    use crate::crd::NodeAgent;
    use crate::template::fixtures;

    fn context() -> Arc<Context> {
        Arc::new(Context::new(
            Arc::new(MockObjectStore::new()),
            Arc::new(OperatorConfig::default()),
        ))
    }

    fn pass_error() -> ReconcilerError {
        let key = ObjectKey::namespaced("observability", "telemetry");
        ReconcilerError::Pass {
            kind: "NodeAgent".to_string(),
            key: key.clone(),
            source: Error::Apply {
                object: ObjectId::new("ServiceAccount", key),
                source: StoreError::Request("timeout".to_string()),
            },
        }
    }

    #[test]
    fn test_backoff_grows_per_resource() {
        let ctx = context();
        let agent = Arc::new(fixtures::agent(false));

        let delays: Vec<Action> = (0..4)
            .map(|_| handle_reconciliation_error(Arc::clone(&agent), &pass_error(), Arc::clone(&ctx)))
            .collect();
        let expected: Vec<Action> = [1, 1, 2, 3]
            .into_iter()
            .map(|secs| Action::requeue(Duration::from_secs(secs)))
            .collect();
        assert_eq!(delays, expected);

        let states = ctx.backoff_states.lock().unwrap();
        let state = states.get(&resource_key::<NodeAgent>(&agent)).unwrap();
        assert_eq!(state.error_count, 4);
    }

    #[test]
    fn test_clean_pass_resets_backoff() {
        let ctx = context();
        let agent = Arc::new(fixtures::agent(false));
        for _ in 0..4 {
            handle_reconciliation_error(Arc::clone(&agent), &pass_error(), Arc::clone(&ctx));
        }

        ctx.reset_backoff(&resource_key::<NodeAgent>(&agent));
        let after_reset = handle_reconciliation_error(agent, &pass_error(), ctx);
        assert_eq!(after_reset, Action::requeue(Duration::from_secs(1)));
    }
}
