//! # NodeAgent Steps
//!
//! A `NodeAgent` is namespaced. Its namespaced resources carry an owner
//! reference and are garbage collected with it; the cluster-scoped RBAC
//! objects cannot be owned by a namespaced object and are deleted explicitly.

use super::{apply, delete, ManagedKind};
use crate::config::OperatorConfig;
use crate::controller::action::Action;
use crate::controller::credentials::CredentialIssuer;
use crate::controller::error::Error;
use crate::controller::step::Step;
use crate::controller::store::{ObjectKey, Owner};
use crate::crd::NodeAgent;
use crate::template::{self, Detail, Params};
use std::time::Duration;

impl ManagedKind for NodeAgent {
    fn apply_steps(&self, config: &OperatorConfig) -> Result<Vec<Step>, Error> {
        let owner = Owner::of(self);
        let params = Params::for_agent(self, config);

        Ok(vec![
            apply(&owner, &template::service_account(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::cluster_role(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::cluster_role_binding(&params, Detail::Full), Action::Stop)?,
            apply(&owner, &template::config_map(&params, Detail::Full), Action::Stop)?,
            // Discovery only; the agents run without it
            apply(&owner, &template::service(&params, Detail::Full), Action::Continue)?,
            apply(&owner, &template::daemon_set(&params, Detail::Full), Action::Stop)?,
            Step::Credentials(Box::new(CredentialIssuer::new(
                owner,
                params,
                self.spec.credentials.enabled,
                config.platform.account_timeout(),
            ))),
        ])
    }

    fn cleanup_steps(&self, config: &OperatorConfig) -> Result<Vec<Step>, Error> {
        let params = Params::for_agent(self, config);
        Ok(vec![
            delete(&template::cluster_role_binding(&params, Detail::MetadataOnly), Action::Stop)?,
            delete(&template::cluster_role(&params, Detail::MetadataOnly), Action::Stop)?,
        ])
    }

    fn workload_key(&self, config: &OperatorConfig) -> ObjectKey {
        let params = Params::for_agent(self, config);
        ObjectKey::namespaced(params.namespace, params.name)
    }

    fn idle_requeue(&self, config: &OperatorConfig) -> Option<Duration> {
        self.spec
            .credentials
            .enabled
            .then_some(config.token_refresh_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::step::Reconcile;
    use crate::template::fixtures;

    fn describe(steps: &[Step]) -> Vec<String> {
        steps.iter().map(Reconcile::describe).collect()
    }

    #[test]
    fn test_apply_order() {
        let steps = fixtures::agent(true)
            .apply_steps(&OperatorConfig::default())
            .unwrap();
        assert_eq!(
            describe(&steps),
            vec![
                "apply ServiceAccount observability/telemetry-agent",
                "apply ClusterRole node-agent-observability-telemetry",
                "apply ClusterRoleBinding node-agent-observability-telemetry",
                "apply ConfigMap observability/telemetry-agent",
                "apply Service observability/telemetry-agent",
                "apply DaemonSet observability/telemetry-agent",
                "credentials observability/telemetry-token",
            ]
        );
    }

    #[test]
    fn test_only_service_is_best_effort() {
        let steps = fixtures::agent(false)
            .apply_steps(&OperatorConfig::default())
            .unwrap();
        let best_effort: Vec<String> = steps
            .iter()
            .filter_map(|step| match step {
                Step::Apply(updater) if updater.on_error == Action::Continue => {
                    Some(updater.object.resource.kind.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(best_effort, vec!["Service"]);
    }

    #[test]
    fn test_cleanup_order_reverses_rbac() {
        let steps = fixtures::agent(false)
            .cleanup_steps(&OperatorConfig::default())
            .unwrap();
        assert_eq!(
            describe(&steps),
            vec![
                "delete ClusterRoleBinding node-agent-observability-telemetry",
                "delete ClusterRole node-agent-observability-telemetry",
            ]
        );
    }

    #[test]
    fn test_idle_requeue_follows_credentials() {
        let config = OperatorConfig::default();
        assert_eq!(
            fixtures::agent(true).idle_requeue(&config),
            Some(config.token_refresh_interval)
        );
        assert_eq!(fixtures::agent(false).idle_requeue(&config), None);
    }

    #[test]
    fn test_workload_key() {
        assert_eq!(
            fixtures::agent(false).workload_key(&OperatorConfig::default()),
            ObjectKey::namespaced("observability", "telemetry-agent")
        );
    }
}
