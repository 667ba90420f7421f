//! # Watch Loop
//!
//! Builds the control loops and drives them until shutdown:
//!
//! - `NodeAgent`, re-triggered by changes to any object it owns
//! - `NodeScanner`, likewise, plus the namespace it created (matched by label,
//!   since namespaces carry no owner reference)
//! - credential expiry, watching credential secrets only

use crate::constants::{
    FIELD_MANAGER, LABEL_APP_NAME, LABEL_CREDENTIAL, LABEL_INSTANCE, LABEL_MANAGED_BY,
    SCANNER_APP_NAME,
};
use crate::controller::reconciler::{reconcile, reconcile_credential, Context};
use crate::crd::{NodeAgent, NodeScanner};
use crate::runtime::error_policy::{handle_credential_error, handle_reconciliation_error};
use anyhow::Result;
use futures::future::join_all;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::observability::server::ServerState;

/// Watcher timeout (seconds); must stay below the client read timeout
const WATCH_TIMEOUT_SECS: u32 = 25;

type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Selects objects created by this operator
fn managed_selector() -> String {
    format!("{LABEL_MANAGED_BY}={FIELD_MANAGER}")
}

/// Selects credential secrets
fn credential_selector() -> String {
    format!("{LABEL_CREDENTIAL}=true")
}

/// The scanner that created `namespace`, read from its labels
fn scanner_for_namespace(namespace: Namespace) -> Option<ObjectRef<NodeScanner>> {
    let labels = namespace.metadata.labels?;
    if labels.get(LABEL_APP_NAME).map(String::as_str) != Some(SCANNER_APP_NAME) {
        return None;
    }
    labels.get(LABEL_INSTANCE).map(|name| ObjectRef::new(name))
}

fn owned_watcher() -> WatcherConfig {
    WatcherConfig::default()
        .timeout(WATCH_TIMEOUT_SECS)
        .labels(&managed_selector())
}

/// Build the `NodeAgent` control loop
pub fn build_agent_controller(client: &Client, ctx: Arc<Context>) -> ControllerFuture {
    info!("- NodeAgent controller");
    Box::pin(
        Controller::new(
            Api::<NodeAgent>::all(client.clone()),
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .owns(Api::<ServiceAccount>::all(client.clone()), owned_watcher())
        .owns(Api::<ConfigMap>::all(client.clone()), owned_watcher())
        .owns(Api::<Service>::all(client.clone()), owned_watcher())
        .owns(Api::<DaemonSet>::all(client.clone()), owned_watcher())
        .owns(Api::<Secret>::all(client.clone()), owned_watcher())
        .shutdown_on_signal()
        .run(
            reconcile::<NodeAgent>,
            handle_reconciliation_error::<NodeAgent>,
            ctx,
        )
        .for_each(log_reconcile_result("NodeAgent")),
    )
}

/// Build the `NodeScanner` control loop
pub fn build_scanner_controller(client: &Client, ctx: Arc<Context>) -> ControllerFuture {
    info!("- NodeScanner controller");
    Box::pin(
        Controller::new(
            Api::<NodeScanner>::all(client.clone()),
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .watches(
            Api::<Namespace>::all(client.clone()),
            owned_watcher(),
            scanner_for_namespace,
        )
        .owns(Api::<ServiceAccount>::all(client.clone()), owned_watcher())
        .owns(Api::<ConfigMap>::all(client.clone()), owned_watcher())
        .owns(Api::<DaemonSet>::all(client.clone()), owned_watcher())
        .shutdown_on_signal()
        .run(
            reconcile::<NodeScanner>,
            handle_reconciliation_error::<NodeScanner>,
            ctx,
        )
        .for_each(log_reconcile_result("NodeScanner")),
    )
}

/// Build the credential expiry loop
pub fn build_credential_controller(client: &Client, ctx: Arc<Context>) -> ControllerFuture {
    info!("- credential expiry controller");
    Box::pin(
        Controller::new(
            Api::<Secret>::all(client.clone()),
            WatcherConfig::default()
                .timeout(WATCH_TIMEOUT_SECS)
                .labels(&credential_selector()),
        )
        .shutdown_on_signal()
        .run(reconcile_credential, handle_credential_error, ctx)
        .for_each(log_reconcile_result("CredentialExpiry")),
    )
}

/// Run every control loop until shutdown
pub async fn run_watch_loop(
    client: Client,
    ctx: Arc<Context>,
    server_state: Arc<ServerState>,
) -> Result<()> {
    info!("Starting controllers:");
    let controllers = vec![
        build_agent_controller(&client, Arc::clone(&ctx)),
        build_scanner_controller(&client, Arc::clone(&ctx)),
        build_credential_controller(&client, ctx),
    ];

    join_all(controllers).await;

    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Controllers stopped, shutting down");
    Ok(())
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::warn!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
