//! # Templates
//!
//! Desired shapes of every managed resource.
//!
//! Builders are pure: they take the [`Params`] resolved from a specification
//! instance plus a [`Detail`] flag and return a typed Kubernetes object.
//! `Detail::MetadataOnly` yields an object carrying only its identity, which is
//! all a delete step needs.
//!
//! ## Sub-modules
//!
//! - `rbac` - ServiceAccount, ClusterRole, ClusterRoleBinding
//! - `workload` - ConfigMap, Service, DaemonSet
//! - `secret` - Credential secret and Namespace

mod rbac;
mod secret;
mod workload;

pub use rbac::{cluster_role, cluster_role_binding, service_account};
pub use secret::{credential_secret, namespace};
pub use workload::{config_map, daemon_set, service};

use crate::config::OperatorConfig;
use crate::constants::{
    AGENT_APP_NAME, DEFAULT_AGENT_PORT, FIELD_MANAGER, LABEL_APP_NAME, LABEL_INSTANCE,
    LABEL_MANAGED_BY, SCANNER_APP_NAME,
};
use crate::crd::{NodeAgent, NodeScanner};
use k8s_openapi::api::rbac::v1::PolicyRule;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Amount of detail a builder fills in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Full,
    MetadataOnly,
}

/// Everything the builders need, resolved from one specification instance
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Application name, also the container name
    pub app: &'static str,
    /// Name of the specification instance
    pub instance: String,
    /// Namespace every namespaced managed object lives in
    pub namespace: String,
    /// Name of the namespaced objects (service account, config, service, workload)
    pub name: String,
    /// Name of the cluster-scoped RBAC objects
    pub cluster_name: String,
    pub image: String,
    /// Port served by the container; `None` means no Service
    pub port: Option<i32>,
    pub config: BTreeMap<String, String>,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub rules: Vec<PolicyRule>,
    /// Secret mounted into the pods, if credentials are issued
    pub credential_secret: Option<String>,
    /// Mount the node root filesystem read-only at `/host`
    pub host_filesystem: bool,
}

impl Params {
    #[must_use]
    pub fn for_agent(agent: &NodeAgent, config: &OperatorConfig) -> Self {
        let instance = agent.metadata.name.clone().unwrap_or_default();
        let namespace = agent.metadata.namespace.clone().unwrap_or_default();
        Self {
            app: AGENT_APP_NAME,
            name: format!("{instance}-agent"),
            cluster_name: format!("node-agent-{namespace}-{instance}"),
            image: agent
                .spec
                .image
                .clone()
                .unwrap_or_else(|| config.default_image.clone()),
            port: Some(agent.spec.port.unwrap_or(DEFAULT_AGENT_PORT)),
            config: agent.spec.config.clone(),
            node_selector: agent.spec.node_selector.clone(),
            rules: vec![
                rule("", &["nodes", "nodes/metrics", "nodes/stats"], &["get", "list", "watch"]),
                rule("", &["pods"], &["get", "list", "watch"]),
            ],
            credential_secret: agent
                .spec
                .credentials
                .enabled
                .then(|| credential_secret_name(&instance)),
            host_filesystem: false,
            instance,
            namespace,
        }
    }

    #[must_use]
    pub fn for_scanner(scanner: &NodeScanner, config: &OperatorConfig) -> Self {
        let instance = scanner.metadata.name.clone().unwrap_or_default();
        Self {
            app: SCANNER_APP_NAME,
            name: format!("{instance}-scanner"),
            cluster_name: format!("node-scanner-{instance}"),
            namespace: scanner.spec.namespace.clone(),
            image: scanner
                .spec
                .image
                .clone()
                .unwrap_or_else(|| config.default_image.clone()),
            port: None,
            config: scanner.spec.config.clone(),
            node_selector: scanner.spec.node_selector.clone(),
            rules: vec![
                rule("", &["nodes"], &["get", "list"]),
                rule("", &["pods", "namespaces"], &["get", "list"]),
            ],
            credential_secret: None,
            host_filesystem: true,
            instance,
        }
    }

    /// Labels stamped on every managed object and used as the pod selector
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_APP_NAME.to_string(), self.app.to_string()),
            (LABEL_INSTANCE.to_string(), self.instance.clone()),
            (LABEL_MANAGED_BY.to_string(), FIELD_MANAGER.to_string()),
        ])
    }

    /// Labels selecting the workload's pods. Kept stable; `managed-by` is not part of it.
    #[must_use]
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (LABEL_APP_NAME.to_string(), self.app.to_string()),
            (LABEL_INSTANCE.to_string(), self.instance.clone()),
        ])
    }

    fn namespaced_meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.labels()),
            ..Default::default()
        }
    }

    fn cluster_meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(self.labels()),
            ..Default::default()
        }
    }
}

/// Name of the credential secret issued for an agent
#[must_use]
pub fn credential_secret_name(instance: &str) -> String {
    format!("{instance}-token")
}

fn rule(group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![group.to_string()]),
        resources: Some(resources.iter().map(|r| (*r).to_string()).collect()),
        verbs: verbs.iter().map(|v| (*v).to_string()).collect(),
        ..Default::default()
    }
}
