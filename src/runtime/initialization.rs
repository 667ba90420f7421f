//! # Initialization
//!
//! Operator initialization: rustls setup, tracing, metrics, server startup
//! and Kubernetes client setup.

use crate::config::{self, OperatorConfig};
use crate::controller::reconciler::Context;
use crate::controller::store::{api_resource, KubeStore, ObjectStore, Selector};
use crate::crd::{NodeAgent, NodeScanner};
use crate::observability;
use crate::observability::server::{start_server, ServerState};
use anyhow::{anyhow, Context as _, Result};
use kube::api::DynamicObject;
use kube::{Client, Resource};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the operator
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Context shared by every control loop
    pub context: Arc<Context>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

/// Initialize the operator runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Configuration loading
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Startup summary of existing resources
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any rustls connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow!("Failed to install rustls crypto provider"));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "node_agent_operator=info".into()),
        )
        .init();

    info!("Starting Node Agent Operator v{}", env!("CARGO_PKG_VERSION"));

    let operator_config = config::load_config();
    info!(
        operator_namespace = %operator_config.operator_namespace,
        platform = ?operator_config.platform,
        token_refresh_interval_secs = operator_config.token_refresh_interval.as_secs(),
        "Loaded configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    // Start server in background task, then wait for it to bind before going on
    let server_state_clone = Arc::clone(&server_state);
    let server_port = operator_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &operator_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let context = Arc::new(Context::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(operator_config),
    ));

    log_startup_summary::<NodeAgent>(context.store.as_ref()).await;
    log_startup_summary::<NodeScanner>(context.store.as_ref()).await;

    info!("Operator initialized, starting watch loops...");

    Ok(InitializationResult {
        client,
        context,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &OperatorConfig,
) -> Result<()> {
    let startup_timeout = config.server_startup_timeout;
    let poll_interval = config.server_poll_interval;
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Names of the given objects grouped by namespace, sorted
fn group_by_namespace(items: &[DynamicObject]) -> BTreeMap<String, Vec<String>> {
    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in items {
        by_namespace
            .entry(
                item.metadata
                    .namespace
                    .clone()
                    .unwrap_or_else(|| "(cluster)".to_string()),
            )
            .or_default()
            .push(item.metadata.name.clone().unwrap_or_default());
    }
    for names in by_namespace.values_mut() {
        names.sort();
    }
    by_namespace
}

/// Log existing specification instances by namespace
///
/// Purely informational: the controllers reconcile every existing instance on
/// their initial list. A failing list usually means the CRD is not installed.
async fn log_startup_summary<K: Resource<DynamicType = ()>>(store: &dyn ObjectStore) {
    let kind = K::kind(&());
    match store.list(&api_resource::<K>(), &Selector::default()).await {
        Ok(items) => {
            let by_namespace = group_by_namespace(&items);
            info!(
                "Found {} existing {} resources in {} namespaces",
                items.len(),
                kind,
                by_namespace.len()
            );
            for (namespace, names) in by_namespace {
                let shown = if names.len() <= 3 {
                    names.join(", ")
                } else {
                    format!("{}, ... ({} total)", names[..3].join(", "), names.len())
                };
                info!("  {}: {}", namespace, shown);
            }
        }
        Err(e) => {
            error!("{} is not queryable; {}. Is the CRD installed?", kind, e);
            warn!(error = %e, "CRD queryability check failed, continuing; the watch will retry");
        }
    }
}
