//! # Custom Resource Definitions
//!
//! CRD types for the Node Agent Operator.
//!
//! Two specification kinds are managed:
//!
//! - [`NodeAgent`]: namespaced. Runs a node agent `DaemonSet` in its own namespace
//!   together with its service account, cluster RBAC, config, service and an
//!   optional short-lived credential.
//! - [`NodeScanner`]: cluster-scoped. Installs a scanner `DaemonSet` into a target
//!   namespace that the operator creates and removes.

mod status;

pub use status::{AgentStatus, Condition, ConditionStatus};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// NodeAgent Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: agents.nodeagent.dev/v1alpha1
/// kind: NodeAgent
/// metadata:
///   name: telemetry
///   namespace: observability
/// spec:
///   image: ghcr.io/nodeagent/agent:1.4.0
///   port: 9100
///   config:
///     LOG_LEVEL: info
///   credentials:
///     enabled: true
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "NodeAgent",
    group = "agents.nodeagent.dev",
    version = "v1alpha1",
    namespaced,
    status = "AgentStatus",
    shortname = "na",
    printcolumn = r#"{"name":"Reconciled", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Reconciled\")].status"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeAgentSpec {
    /// Agent container image. Defaults to the operator's configured image.
    #[serde(default)]
    pub image: Option<String>,
    /// Port the agent serves on; exposed through a headless Service
    #[serde(default)]
    pub port: Option<i32>,
    /// Key/value configuration rendered into the agent ConfigMap
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Restricts the nodes the agent runs on
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
    /// Short-lived credential issued to the agent
    #[serde(default)]
    pub credentials: CredentialsSpec,
}

/// Credential issuance settings
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsSpec {
    /// Issue and rotate a bearer token secret for the agent
    /// Default: false. Disabling deletes any previously issued secret.
    #[serde(default)]
    pub enabled: bool,
}

/// NodeScanner Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: agents.nodeagent.dev/v1alpha1
/// kind: NodeScanner
/// metadata:
///   name: cis
/// spec:
///   namespace: node-scanner
///   image: ghcr.io/nodeagent/scanner:0.9.2
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "NodeScanner",
    group = "agents.nodeagent.dev",
    version = "v1alpha1",
    status = "AgentStatus",
    shortname = "nsc",
    printcolumn = r#"{"name":"Namespace", "type":"string", "jsonPath":".spec.namespace"}, {"name":"Reconciled", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Reconciled\")].status"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeScannerSpec {
    /// Namespace the scanner is installed into; created and deleted by the operator
    pub namespace: String,
    /// Scanner container image. Defaults to the operator's configured image.
    #[serde(default)]
    pub image: Option<String>,
    /// Key/value configuration rendered into the scanner ConfigMap
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Restricts the nodes the scanner runs on
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
}
