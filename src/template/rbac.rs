//! # RBAC Templates

use super::{Detail, Params};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, RoleRef, Subject};

#[must_use]
pub fn service_account(params: &Params, _detail: Detail) -> ServiceAccount {
    ServiceAccount {
        metadata: params.namespaced_meta(&params.name),
        ..Default::default()
    }
}

#[must_use]
pub fn cluster_role(params: &Params, detail: Detail) -> ClusterRole {
    ClusterRole {
        metadata: params.cluster_meta(&params.cluster_name),
        rules: match detail {
            Detail::Full => Some(params.rules.clone()),
            Detail::MetadataOnly => None,
        },
        ..Default::default()
    }
}

/// Binds the cluster role to the workload's service account.
///
/// The binding has no owner reference for namespaced owners, so its role
/// reference and subject are the only link back to the instance.
#[must_use]
pub fn cluster_role_binding(params: &Params, detail: Detail) -> ClusterRoleBinding {
    let metadata = params.cluster_meta(&params.cluster_name);
    match detail {
        Detail::MetadataOnly => ClusterRoleBinding {
            metadata,
            ..Default::default()
        },
        Detail::Full => ClusterRoleBinding {
            metadata,
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: params.cluster_name.clone(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: params.name.clone(),
                namespace: Some(params.namespace.clone()),
                ..Default::default()
            }]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::template::fixtures;

    #[test]
    fn test_binding_targets_service_account() {
        let params = Params::for_agent(&fixtures::agent(false), &OperatorConfig::default());
        let binding = cluster_role_binding(&params, Detail::Full);
        assert_eq!(binding.role_ref.name, "node-agent-observability-telemetry");
        let subject = &binding.subjects.unwrap()[0];
        assert_eq!(subject.name, "telemetry-agent");
        assert_eq!(subject.namespace.as_deref(), Some("observability"));
        assert!(binding.metadata.namespace.is_none());
    }

    #[test]
    fn test_metadata_only_role_has_no_rules() {
        let params = Params::for_scanner(&fixtures::scanner(), &OperatorConfig::default());
        assert!(cluster_role(&params, Detail::MetadataOnly).rules.is_none());
        assert!(!cluster_role(&params, Detail::Full).rules.unwrap().is_empty());
    }
}
